//! 内存盘：用一段内存模拟块设备，并统计读写次数

use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::BlockDevice;

#[derive(Debug)]
pub struct RamDisk {
    block_size: usize,
    data: Mutex<Vec<u8>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RamDisk {
    /// 创建 `blocks` 块、每块 `block_size` 字节的全零内存盘
    pub fn new(block_size: usize, blocks: usize) -> Self {
        Self {
            block_size,
            data: Mutex::new(vec![0; block_size * blocks]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn blocks(&self) -> usize {
        self.data.lock().len() / self.block_size
    }

    #[inline]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// 读写总次数
    #[inline]
    pub fn io_count(&self) -> usize {
        self.reads() + self.writes()
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    fn range(&self, block_id: usize, len: usize) -> core::ops::Range<usize> {
        assert_eq!(len, self.block_size, "not a complete block!");
        let start = block_id * self.block_size;
        start..start + self.block_size
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let range = self.range(block_id, buf.len());
        buf.copy_from_slice(&self.data.lock()[range]);
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let range = self.range(block_id, buf.len());
        self.data.lock()[range].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back_written_block() {
        let disk = RamDisk::new(16, 4);
        let mut buf = [0u8; 16];

        disk.read_block(2, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));

        disk.write_block(2, &[7; 16]);
        disk.read_block(2, &mut buf);
        assert_eq!(buf, [7; 16]);

        // 相邻块不受影响
        disk.read_block(3, &mut buf);
        assert!(buf.iter().all(|&b| b == 0));

        assert_eq!(disk.reads(), 3);
        assert_eq!(disk.writes(), 1);
        assert_eq!(disk.blocks(), 4);

        disk.reset_counters();
        assert_eq!(disk.io_count(), 0);
    }

    #[test]
    #[should_panic(expected = "not a complete block!")]
    fn partial_block_is_rejected() {
        let disk = RamDisk::new(16, 4);
        disk.write_block(0, &[1; 8]);
    }
}
