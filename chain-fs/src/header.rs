//! # 文件头层
//!
//! 文件头占满一个扇区，记录文件的元数据与索引链首节点的位置，
//! 本身不含任何数据扇区的编号。
//!
//! 目录层在创建文件时调用 [`FileHeader::allocate`]，删除时调用
//! [`FileHeader::deallocate`]，打开/关闭时 [`FileHeader::fetch_from`] /
//! [`FileHeader::write_back`]；读写前端每次访问都经 [`FileHeader::byte_to_sector`]
//! 翻译地址，追加写之前用 [`FileHeader::add_file_size`] 原地扩容。
//!
//! 不变式：每次成功修改后 `num_sectors == ceil(num_bytes / SECTOR_SIZE)`。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::chain::{ChainWriter, IndexChain};
use crate::free_map::{FreeMap, claim, reserve};
use crate::layout::{self, DiskHeader};
use crate::{
    ByteCount, ByteOffset, Error, FileKind, IndexNode, NUM_DIRECT, Result, SECTOR_SIZE,
    SectorCount, SectorId, sector,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    kind: FileKind,
    /// 创建、修改、打开时间，单位由调用者决定（CLI 用 Unix 秒）
    created: u64,
    modified: u64,
    opened: u64,
    /// 文件的逻辑长度
    num_bytes: ByteCount,
    /// 已分配的数据扇区数
    num_sectors: SectorCount,
    /// 索引链首节点
    first_index_sector: SectorId,
}

impl FileHeader {
    /// 为新文件分配索引链与数据扇区。
    ///
    /// 容量检查先于一切占用：空闲扇区不足 [`FileHeader::required_sectors`]
    /// 时返回 [`Error::InsufficientSpace`]，位图与磁盘都不会被改动。
    pub fn allocate(
        free_map: &mut impl FreeMap,
        file_size: ByteCount,
        kind: FileKind,
        now: u64,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<Self> {
        reserve(free_map, Self::required_sectors(file_size))?;

        let num_sectors = file_size.sectors();
        let head = claim(free_map)?;
        ChainWriter::new(head, IndexNode::default(), 0, block_device)
            .append(num_sectors.as_usize(), free_map)?;
        log::debug!("allocated {file_size} bytes in {num_sectors} sectors, chain at {head}");

        Ok(Self {
            kind,
            created: now,
            modified: now,
            opened: now,
            num_bytes: file_size,
            num_sectors,
            first_index_sector: head,
        })
    }

    /// 新建 `file_size` 字节的文件至少需要多少个空闲扇区（不含文件头自身）。
    ///
    /// 每组按满额计，空文件也要一个首节点。
    pub fn required_sectors(file_size: ByteCount) -> SectorCount {
        file_size.sectors().reservation().max(SectorCount::new(1))
    }

    /// 回收索引链与全部数据扇区；文件头所在扇区由调用者释放。
    ///
    /// 每个节点先释放自身，再释放它记录的数据扇区；
    /// 最后一个节点的链接不会被解引用。
    pub fn deallocate(
        self,
        free_map: &mut impl FreeMap,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<()> {
        let mut remaining = self.num_sectors.as_usize();

        for node in self.chain(block_device).nodes() {
            let (sector, node) = node?;
            free_map.clear(sector);

            let used = remaining.min(NUM_DIRECT);
            for &data in &node.direct[..used] {
                free_map.clear(data);
            }
            remaining -= used;
        }

        log::debug!(
            "released {} data sectors of chain {}",
            self.num_sectors,
            self.first_index_sector
        );
        Ok(())
    }

    /// 返回存放第 `offset` 字节的物理扇区。
    ///
    /// 逐个节点前进，每一跳读一次磁盘；`offset` 必须在 `[0, num_bytes)` 内。
    pub fn byte_to_sector(
        &self,
        offset: ByteOffset,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<SectorId> {
        if !self.num_bytes.contains(offset) {
            return Err(Error::InvalidOffset {
                offset,
                length: self.num_bytes,
            });
        }

        let mut target = offset.sector_index();
        let mut sector = self.first_index_sector;
        loop {
            let node = IndexNode::fetch(sector, block_device)?;
            if target < NUM_DIRECT {
                return Ok(node.direct[target]);
            }
            target -= NUM_DIRECT;
            sector = node.next.ok_or(Error::Corrupted(sector))?;
        }
    }

    /// 原地把文件加长 `add_size` 字节。
    ///
    /// 增长落在最后一个扇区的空余里时只改长度，不做任何磁盘读写；
    /// 否则先做与 [`FileHeader::allocate`] 相同的保守容量检查，
    /// 再从链尾节点的第一个空槽位起追加新扇区。
    pub fn add_file_size(
        &mut self,
        free_map: &mut impl FreeMap,
        add_size: ByteCount,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<()> {
        let new_len = self
            .num_bytes
            .checked_add(add_size)
            .ok_or(Error::FileTooLarge)?;
        let add_sectors = new_len.sectors() - self.num_sectors;

        if add_sectors == SectorCount::ZERO {
            self.num_bytes = new_len;
            return Ok(());
        }

        reserve(free_map, add_sectors.reservation())?;

        let chain = self.chain(block_device);
        let (tail, node) = chain
            .nodes()
            .last()
            .ok_or(Error::Corrupted(self.first_index_sector))??;
        let slot = self.num_sectors.as_usize() - (chain.node_count() - 1) * NUM_DIRECT;
        ChainWriter::new(tail, node, slot, block_device)
            .append(add_sectors.as_usize(), free_map)?;

        log::debug!(
            "chain {} grew by {add_sectors} sectors to {new_len} bytes",
            self.first_index_sector
        );
        self.num_sectors += add_sectors;
        self.num_bytes = new_len;
        Ok(())
    }

    /// 从 `sector` 读出文件头，只访问这一个扇区
    pub fn fetch_from(sector: SectorId, block_device: &Arc<dyn BlockDevice>) -> Result<Self> {
        let disk: DiskHeader = layout::decode(&sector::read(sector, block_device), sector)?;

        let kind = FileKind::from_raw(disk.kind).ok_or(Error::Corrupted(sector))?;
        let num_bytes = ByteCount::new(disk.num_bytes);
        let num_sectors = SectorCount::new(disk.num_sectors);
        if num_bytes.sectors() != num_sectors {
            log::warn!("header {sector}: {num_bytes} bytes in {num_sectors} sectors");
            return Err(Error::Corrupted(sector));
        }

        Ok(Self {
            kind,
            created: disk.created,
            modified: disk.modified,
            opened: disk.opened,
            num_bytes,
            num_sectors,
            first_index_sector: SectorId::new(disk.first_index_sector),
        })
    }

    /// 把文件头写回 `sector`，只访问这一个扇区
    pub fn write_back(&self, sector: SectorId, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        let disk = DiskHeader {
            kind: self.kind.raw(),
            created: self.created,
            modified: self.modified,
            opened: self.opened,
            num_bytes: self.num_bytes.into(),
            num_sectors: self.num_sectors.into(),
            first_index_sector: self.first_index_sector.into(),
        };
        sector::write(sector, &layout::encode(&disk, sector)?, block_device);
        Ok(())
    }

    #[inline]
    pub fn file_length(&self) -> ByteCount {
        self.num_bytes
    }

    #[inline]
    pub fn num_sectors(&self) -> SectorCount {
        self.num_sectors
    }

    #[inline]
    pub fn first_index_sector(&self) -> SectorId {
        self.first_index_sector
    }

    #[inline]
    pub fn kind(&self) -> FileKind {
        self.kind
    }

    #[inline]
    pub fn created(&self) -> u64 {
        self.created
    }

    #[inline]
    pub fn modified(&self) -> u64 {
        self.modified
    }

    #[inline]
    pub fn opened(&self) -> u64 {
        self.opened
    }

    #[inline]
    pub fn mark_opened(&mut self, now: u64) {
        self.opened = now;
    }

    #[inline]
    pub fn mark_modified(&mut self, now: u64) {
        self.modified = now;
    }

    /// 本文件的索引链
    pub fn chain<'a>(&self, block_device: &'a Arc<dyn BlockDevice>) -> IndexChain<'a> {
        IndexChain::new(self.first_index_sector, self.num_sectors, block_device)
    }

    /// 按文件顺序列出全部数据扇区
    pub fn data_sectors(&self, block_device: &Arc<dyn BlockDevice>) -> Result<Vec<SectorId>> {
        self.chain(block_device).data_sectors()
    }
}

/* 以扇区为单位的读写，不缓存、不合并 */
impl FileHeader {
    /// 从指定位置（字节偏移）读出数据填充 `buf`，读到文件末尾为止
    pub fn read_at(
        &self,
        offset: ByteOffset,
        buf: &mut [u8],
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<usize> {
        let mut start = offset.as_usize();
        let end = (start + buf.len()).min(self.num_bytes.as_usize());

        if start >= end {
            return Ok(0);
        }

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            let sector_index = start / SECTOR_SIZE;
            // 当前扇区的末地址(字节)
            let current_sector_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let sector_read_size = current_sector_end - start;

            let id = self.byte_to_sector(ByteOffset::new(start as u32), block_device)?;
            let data = sector::read(id, block_device);
            // 绝对地址 % 扇区大小 = 扇区内偏移
            let src = &data[start % SECTOR_SIZE..start % SECTOR_SIZE + sector_read_size];
            buf[read_size..read_size + sector_read_size].copy_from_slice(src);

            read_size += sector_read_size;

            if current_sector_end == end {
                break;
            }

            start = current_sector_end;
        }

        Ok(read_size)
    }

    /// 在指定位置写入 `buf`，只写到文件末尾，不会加长文件
    pub fn write_at(
        &self,
        offset: ByteOffset,
        buf: &[u8],
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<usize> {
        let mut start = offset.as_usize();
        let end = (start + buf.len()).min(self.num_bytes.as_usize());

        if start >= end {
            return Ok(0);
        }

        let mut written_size = 0;
        loop {
            let sector_index = start / SECTOR_SIZE;
            let current_sector_end = ((sector_index + 1) * SECTOR_SIZE).min(end);
            let sector_write_size = current_sector_end - start;

            let id = self.byte_to_sector(ByteOffset::new(start as u32), block_device)?;
            // 只写扇区的一部分时，先读出原内容
            let mut data = if sector_write_size < SECTOR_SIZE {
                sector::read(id, block_device)
            } else {
                [0; SECTOR_SIZE]
            };
            data[start % SECTOR_SIZE..start % SECTOR_SIZE + sector_write_size]
                .copy_from_slice(&buf[written_size..written_size + sector_write_size]);
            sector::write(id, &data, block_device);

            written_size += sector_write_size;

            if current_sector_end == end {
                break;
            }

            start = current_sector_end;
        }

        Ok(written_size)
    }
}
