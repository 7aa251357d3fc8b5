use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::layout::{decode, encode};
use crate::{Result, SECTOR_SIZE, SectorId, sector};

/// 一个扇区能记录多少个扇区的分配情况
const SECTOR_BITS: usize = SECTOR_SIZE * 8;
/// 位图扇区的结构
type BitmapSector = [u64; SECTOR_SIZE / 8];

/// 空闲扇区位图，置位表示已分配。
///
/// 位图常驻内存，由 [`Bitmap::fetch_from`] 载入、[`Bitmap::write_back`] 落盘。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    groups: Vec<u64>,
    /// 位图所指示的扇区总数
    capacity: usize,
}

impl Bitmap {
    /// 全部空闲的位图
    pub fn new(capacity: usize) -> Self {
        let mut bitmap = Self {
            groups: vec![0; capacity.div_ceil(64)],
            capacity,
        };
        bitmap.seal_tail();
        bitmap
    }

    /// 位图落盘需要占用的扇区数
    #[inline]
    pub fn sectors_for(capacity: usize) -> usize {
        capacity.div_ceil(SECTOR_BITS)
    }

    /// 分配一个空闲扇区，返回其编号；
    /// 位图已满则返回空。
    pub fn alloc(&mut self) -> Option<SectorId> {
        let (group_index, ingroup_index) =
            self.groups
                .iter()
                .enumerate()
                .find_map(|(group_index, &bits)| {
                    (bits != u64::MAX).then_some((group_index, bits.trailing_ones()))
                })?;

        self.groups[group_index] |= 1 << ingroup_index;
        Some(SectorId::new((group_index * 64) as u32 + ingroup_index))
    }

    pub fn dealloc(&mut self, id: SectorId) {
        let (group_index, ingroup_index) = self.position(id);

        // 编号一定得有对应的位
        assert_ne!(
            self.groups[group_index] & (1 << ingroup_index),
            0,
            "sector {id} is not allocated"
        );

        self.groups[group_index] &= !(1 << ingroup_index);
    }

    /// 把指定扇区标记为已分配，用于预留超级块与位图自身
    pub fn mark(&mut self, id: SectorId) {
        let (group_index, ingroup_index) = self.position(id);
        self.groups[group_index] |= 1 << ingroup_index;
    }

    pub fn is_allocated(&self, id: SectorId) -> bool {
        let (group_index, ingroup_index) = self.position(id);
        self.groups[group_index] & (1 << ingroup_index) != 0
    }

    /// 空闲扇区数
    pub fn free_count(&self) -> usize {
        self.groups
            .iter()
            .map(|bits| bits.count_zeros() as usize)
            .sum()
    }

    /// 从 `start` 起的连续扇区载入位图
    pub fn fetch_from(
        start: SectorId,
        capacity: usize,
        block_device: &Arc<dyn BlockDevice>,
    ) -> Result<Self> {
        let mut groups = Vec::with_capacity(Self::sectors_for(capacity) * SECTOR_SIZE / 8);
        for sector_id in Self::sector_ids(start, capacity) {
            let words: BitmapSector = decode(&sector::read(sector_id, block_device), sector_id)?;
            groups.extend_from_slice(&words);
        }
        groups.truncate(capacity.div_ceil(64));

        let mut bitmap = Self { groups, capacity };
        bitmap.seal_tail();
        Ok(bitmap)
    }

    /// 把位图写回从 `start` 起的连续扇区
    pub fn write_back(&self, start: SectorId, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        let chunks = self.groups.chunks(SECTOR_SIZE / 8);
        for (sector_id, chunk) in Self::sector_ids(start, self.capacity).zip(chunks) {
            let mut words: BitmapSector = [u64::MAX; SECTOR_SIZE / 8];
            words[..chunk.len()].copy_from_slice(chunk);
            sector::write(sector_id, &encode(&words, sector_id)?, block_device);
        }
        Ok(())
    }
}

impl Bitmap {
    /// 返回扇区号对应的位置（组索引 + 组内索引）
    fn position(&self, id: SectorId) -> (usize, u32) {
        let index = id.block();
        assert!(index < self.capacity, "sector {id} is out of the bitmap");
        (index / 64, (index % 64) as u32)
    }

    /// 末组超出容量的位恒为已分配，`alloc` 永远不会返回它们
    fn seal_tail(&mut self) {
        let used = self.capacity % 64;
        if used != 0 {
            if let Some(last) = self.groups.last_mut() {
                *last |= u64::MAX << used;
            }
        }
    }

    fn sector_ids(start: SectorId, capacity: usize) -> impl Iterator<Item = SectorId> {
        let start = u32::from(start);
        (0..Self::sectors_for(capacity) as u32).map(move |i| SectorId::new(start + i))
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use block_dev::{BlockDevice, RamDisk};

    use super::*;

    #[test]
    fn alloc_lowest_free_first() {
        let mut bitmap = Bitmap::new(130);
        for i in 0..130 {
            assert_eq!(bitmap.alloc(), Some(SectorId::new(i)));
        }
        // 超出容量的位不会被分配
        assert_eq!(bitmap.alloc(), None);
        assert_eq!(bitmap.free_count(), 0);

        bitmap.dealloc(SectorId::new(0));
        bitmap.dealloc(SectorId::new(127));
        assert_eq!(bitmap.free_count(), 2);
        assert_eq!(bitmap.alloc(), Some(SectorId::new(0)));
        assert_eq!(bitmap.alloc(), Some(SectorId::new(127)));
    }

    #[test]
    fn marked_sectors_are_skipped() {
        let mut bitmap = Bitmap::new(64);
        bitmap.mark(SectorId::new(0));
        bitmap.mark(SectorId::new(1));
        assert!(bitmap.is_allocated(SectorId::new(1)));
        assert!(!bitmap.is_allocated(SectorId::new(2)));
        assert_eq!(bitmap.free_count(), 62);
        assert_eq!(bitmap.alloc(), Some(SectorId::new(2)));
    }

    #[test]
    #[should_panic(expected = "is not allocated")]
    fn double_release_panics() {
        let mut bitmap = Bitmap::new(8);
        let id = bitmap.alloc().unwrap();
        bitmap.dealloc(id);
        bitmap.dealloc(id);
    }

    #[test]
    fn persist_across_sectors() {
        // 1500 个扇区需要两个位图扇区
        assert_eq!(Bitmap::sectors_for(1500), 2);
        let dev: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(SECTOR_SIZE, 8));

        let mut bitmap = Bitmap::new(1500);
        for _ in 0..1100 {
            bitmap.alloc();
        }
        bitmap.dealloc(SectorId::new(17));
        bitmap.write_back(SectorId::new(3), &dev).unwrap();

        let loaded = Bitmap::fetch_from(SectorId::new(3), 1500, &dev).unwrap();
        assert_eq!(loaded, bitmap);
        assert_eq!(loaded.free_count(), 401);
        assert!(!loaded.is_allocated(SectorId::new(17)));
        assert!(loaded.is_allocated(SectorId::new(1099)));
    }
}
