//! # 卷
//!
//! 构建出磁盘的布局并使用：
//! 0 号扇区是超级块，随后是空闲位图，其余扇区统一分配给文件头、索引节点与数据。
//!
//! 卷替目录层管理文件头的生命周期，文件头以其所在扇区号指代。

use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::free_map::{FreeMap, claim, reserve};
use crate::layout::{self, SuperBlock};
use crate::{
    Bitmap, ByteCount, Error, FileHeader, FileKind, Result, SectorCount, SectorId, sector,
};

const SUPER_BLOCK: SectorId = SectorId::new(0);
const BITMAP_START: SectorId = SectorId::new(1);

pub struct Volume {
    block_device: Arc<dyn BlockDevice>,
    free_map: Bitmap,
    total_sectors: u32,
}

impl Volume {
    /// 在块设备上建立一个 `total_sectors` 个扇区的空卷。
    ///
    /// 除超级块与位图外至少还要留出一个扇区，否则返回 [`Error::InsufficientSpace`]，
    /// 块设备不被改动。
    pub fn format(block_device: Arc<dyn BlockDevice>, total_sectors: u32) -> Result<Self> {
        let bitmap_sectors = Bitmap::sectors_for(total_sectors as usize) as u32;
        let required = 1 + bitmap_sectors + 1;
        if total_sectors < required {
            log::warn!("{total_sectors} sectors leave no room for files");
            return Err(Error::InsufficientSpace {
                required: SectorCount::new(required),
                available: SectorCount::new(total_sectors),
            });
        }

        let mut free_map = Bitmap::new(total_sectors as usize);
        for id in 0..=bitmap_sectors {
            free_map.mark(SectorId::new(id));
        }

        let super_block = SuperBlock {
            total_sectors,
            bitmap_sectors,
        };
        sector::write(
            SUPER_BLOCK,
            &layout::encode(&super_block, SUPER_BLOCK)?,
            &block_device,
        );

        let volume = Self {
            block_device,
            free_map,
            total_sectors,
        };
        volume.sync()?;
        log::info!(
            "formatted {total_sectors} sectors, {} free",
            volume.free_sectors()
        );

        Ok(volume)
    }

    /// 打开块设备上已有的卷
    pub fn open(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        let super_block: SuperBlock =
            layout::decode(&sector::read(SUPER_BLOCK, &block_device), SUPER_BLOCK)?;
        let bitmap_sectors = Bitmap::sectors_for(super_block.total_sectors as usize);
        if super_block.bitmap_sectors as usize != bitmap_sectors {
            log::warn!("super block claims {} bitmap sectors", super_block.bitmap_sectors);
            return Err(Error::Corrupted(SUPER_BLOCK));
        }

        let free_map = Bitmap::fetch_from(
            BITMAP_START,
            super_block.total_sectors as usize,
            &block_device,
        )?;

        Ok(Self {
            block_device,
            free_map,
            total_sectors: super_block.total_sectors,
        })
    }

    /// 把位图写回磁盘
    pub fn sync(&self) -> Result<()> {
        self.free_map.write_back(BITMAP_START, &self.block_device)
    }

    #[inline]
    pub fn block_device(&self) -> &Arc<dyn BlockDevice> {
        &self.block_device
    }

    #[inline]
    pub fn free_map(&self) -> &Bitmap {
        &self.free_map
    }

    #[inline]
    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    #[inline]
    pub fn free_sectors(&self) -> SectorCount {
        self.free_map.num_clear()
    }

    /// 创建 `size` 字节的文件，返回其文件头所在扇区。
    ///
    /// 容量检查把文件头自身也算在内，失败时卷不变。
    pub fn create(&mut self, size: ByteCount, kind: FileKind, now: u64) -> Result<SectorId> {
        reserve(
            &self.free_map,
            FileHeader::required_sectors(size) + SectorCount::new(1),
        )?;

        let header_sector = claim(&mut self.free_map)?;
        let header =
            match FileHeader::allocate(&mut self.free_map, size, kind, now, &self.block_device) {
                Ok(header) => header,
                Err(err) => {
                    self.free_map.clear(header_sector);
                    return Err(err);
                }
            };
        header.write_back(header_sector, &self.block_device)?;
        self.sync()?;

        log::info!("created file at {header_sector}, {size} bytes");
        Ok(header_sector)
    }

    /// 打开文件：读出文件头并记下打开时间
    pub fn open_file(&mut self, header_sector: SectorId, now: u64) -> Result<FileHeader> {
        let mut header = FileHeader::fetch_from(header_sector, &self.block_device)?;
        header.mark_opened(now);
        header.write_back(header_sector, &self.block_device)?;
        Ok(header)
    }

    /// 把文件加长 `add_size` 字节，返回更新后的文件头
    pub fn extend(
        &mut self,
        header_sector: SectorId,
        add_size: ByteCount,
        now: u64,
    ) -> Result<FileHeader> {
        let mut header = FileHeader::fetch_from(header_sector, &self.block_device)?;
        header.add_file_size(&mut self.free_map, add_size, &self.block_device)?;
        header.mark_modified(now);
        header.write_back(header_sector, &self.block_device)?;
        self.sync()?;
        Ok(header)
    }

    /// 删除文件：回收索引链、数据扇区与文件头所在扇区
    pub fn remove(&mut self, header_sector: SectorId) -> Result<()> {
        let header = FileHeader::fetch_from(header_sector, &self.block_device)?;
        header.deallocate(&mut self.free_map, &self.block_device)?;
        self.free_map.clear(header_sector);
        self.sync()?;

        log::info!("removed file at {header_sector}");
        Ok(())
    }
}
