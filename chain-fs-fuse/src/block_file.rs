use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use block_dev::BlockDevice;
use chain_fs::SECTOR_SIZE;
use send_wrapper::SendWrapper;

/// A disk image on the host, addressed in `SECTOR_SIZE` blocks.
#[derive(Debug)]
pub struct BlockFile {
    inner: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self {
            inner: SendWrapper::new(RefCell::new(fd)),
        }
    }

    fn seek_to(file: &mut File, block_id: usize) {
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete block!");
        let mut file = self.inner.borrow_mut();
        Self::seek_to(&mut file, block_id);
        file.read_exact(buf)
            .unwrap_or_else(|err| panic!("reading sector {block_id}: {err}"));
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete block!");
        let mut file = self.inner.borrow_mut();
        Self::seek_to(&mut file, block_id);
        file.write_all(buf)
            .unwrap_or_else(|err| panic!("writing sector {block_id}: {err}"));
    }
}
