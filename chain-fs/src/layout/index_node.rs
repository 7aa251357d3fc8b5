//! 索引节点
//!
//! 一个扇区连续存放 `NUM_DIRECT + 1` 个小端 `u32` 扇区号：
//! 前 `NUM_DIRECT` 个指向数据扇区，最后一个指向链上的下一个节点。
//! 空槽位记作 [`SectorId::UNSET`]，链尾节点的链接也是它。

use alloc::sync::Arc;

use binrw::binrw;
use block_dev::BlockDevice;

use crate::layout::{decode, encode};
use crate::{NUM_DIRECT, Result, SectorId, sector};

const UNSET: u32 = u32::MAX;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    #[br(map = |raw: [u32; NUM_DIRECT]| raw.map(SectorId::from))]
    #[bw(map = |direct: &[SectorId; NUM_DIRECT]| direct.map(u32::from))]
    pub direct: [SectorId; NUM_DIRECT],

    #[br(map = |raw: u32| (raw != UNSET).then_some(SectorId::from(raw)))]
    #[bw(map = |next: &Option<SectorId>| next.map_or(UNSET, u32::from))]
    pub next: Option<SectorId>,
}

impl Default for IndexNode {
    fn default() -> Self {
        Self {
            direct: [SectorId::UNSET; NUM_DIRECT],
            next: None,
        }
    }
}

impl IndexNode {
    /// 从磁盘读出 `sector` 处的索引节点
    pub fn fetch(sector: SectorId, block_device: &Arc<dyn BlockDevice>) -> Result<Self> {
        decode(&sector::read(sector, block_device), sector)
    }

    /// 把节点写回 `sector`
    pub fn flush(&self, sector: SectorId, block_device: &Arc<dyn BlockDevice>) -> Result<()> {
        sector::write(sector, &encode(self, sector)?, block_device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use block_dev::{BlockDevice, RamDisk};

    use super::*;
    use crate::SECTOR_SIZE;

    #[test]
    fn node_fills_one_sector() {
        let mut node = IndexNode::default();
        node.direct[0] = SectorId::new(5);
        node.direct[30] = SectorId::new(0x0102_0304);

        let data = encode(&node, SectorId::new(9)).unwrap();
        assert_eq!(&data[..4], &[5, 0, 0, 0]);
        assert_eq!(&data[30 * 4..31 * 4], &[4, 3, 2, 1]);
        // 未链接：最后一个槽位为全1
        assert_eq!(&data[SECTOR_SIZE - 4..], &[0xFF; 4]);

        node.next = Some(SectorId::new(7));
        let data = encode(&node, SectorId::new(9)).unwrap();
        assert_eq!(&data[SECTOR_SIZE - 4..], &[7, 0, 0, 0]);
    }

    #[test]
    fn fetch_flushed_node() {
        let dev: Arc<dyn BlockDevice> = Arc::new(RamDisk::new(SECTOR_SIZE, 4));
        let mut node = IndexNode::default();
        node.direct[3] = SectorId::new(2);
        node.next = Some(SectorId::new(1));

        node.flush(SectorId::new(3), &dev).unwrap();
        assert_eq!(IndexNode::fetch(SectorId::new(3), &dev).unwrap(), node);
    }
}
