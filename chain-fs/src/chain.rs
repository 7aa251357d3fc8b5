//! # 索引链
//!
//! 文件的物理块映射是一条索引节点单链表：
//! 第 `k` 个节点记录文件第 `k * NUM_DIRECT` 到 `(k + 1) * NUM_DIRECT - 1` 个数据扇区。
//! 节点数为 `ceil(num_sectors / NUM_DIRECT)`；空文件也保有一个空的首节点。
//!
//! 节点按需从磁盘读取，不做跨调用的缓存。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::free_map::{FreeMap, claim};
use crate::{Error, IndexNode, NUM_DIRECT, Result, SectorCount, SectorId};

/// 某个文件的索引链视图
pub struct IndexChain<'a> {
    head: SectorId,
    num_sectors: SectorCount,
    block_device: &'a Arc<dyn BlockDevice>,
}

impl<'a> IndexChain<'a> {
    pub fn new(
        head: SectorId,
        num_sectors: SectorCount,
        block_device: &'a Arc<dyn BlockDevice>,
    ) -> Self {
        Self {
            head,
            num_sectors,
            block_device,
        }
    }

    #[inline]
    pub fn head(&self) -> SectorId {
        self.head
    }

    /// 链上的节点个数
    #[inline]
    pub fn node_count(&self) -> usize {
        self.num_sectors.index_nodes().max(1)
    }

    /// 依次读出链上的节点及其所在扇区
    pub fn nodes(&self) -> Nodes<'a> {
        Nodes {
            next: Some(self.head),
            remaining: self.node_count(),
            block_device: self.block_device,
        }
    }

    /// 按文件顺序列出全部数据扇区
    pub fn data_sectors(&self) -> Result<Vec<SectorId>> {
        let mut remaining = self.num_sectors.as_usize();
        let mut sectors = Vec::with_capacity(remaining);

        for node in self.nodes() {
            let (_, node) = node?;
            let used = remaining.min(NUM_DIRECT);
            sectors.extend_from_slice(&node.direct[..used]);
            remaining -= used;
        }

        Ok(sectors)
    }
}

/// 索引链上节点的迭代器。
///
/// 还应有后继的节点却没有链接时，产出 [`Error::Corrupted`] 并结束。
pub struct Nodes<'a> {
    next: Option<SectorId>,
    remaining: usize,
    block_device: &'a Arc<dyn BlockDevice>,
}

impl Iterator for Nodes<'_> {
    type Item = Result<(SectorId, IndexNode)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let sector = self.next.take()?;
        self.remaining -= 1;

        let node = match IndexNode::fetch(sector, self.block_device) {
            Ok(node) => node,
            Err(err) => {
                self.remaining = 0;
                return Some(Err(err));
            }
        };
        log::trace!("index node {sector} -> {:?}", node.next);

        if self.remaining > 0 {
            match node.next {
                Some(next) => self.next = Some(next),
                None => {
                    log::warn!("index node {sector} ends the chain early");
                    self.remaining = 0;
                    return Some(Err(Error::Corrupted(sector)));
                }
            }
        }

        Some(Ok((sector, node)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// 在链尾追加数据扇区。
///
/// 节点写满且仍有数据要追加时，先申请下一个节点、记入当前节点的链接，
/// 再把当前节点写回；最后一个节点写回时链接留空。
pub(crate) struct ChainWriter<'a> {
    sector: SectorId,
    node: IndexNode,
    /// 下一个要填的槽位
    slot: usize,
    block_device: &'a Arc<dyn BlockDevice>,
}

impl<'a> ChainWriter<'a> {
    pub fn new(
        sector: SectorId,
        node: IndexNode,
        slot: usize,
        block_device: &'a Arc<dyn BlockDevice>,
    ) -> Self {
        debug_assert!(slot <= NUM_DIRECT);
        Self {
            sector,
            node,
            slot,
            block_device,
        }
    }

    /// 申请 `count` 个数据扇区依次填入槽位，并写回所有被改动的节点
    pub fn append(mut self, count: usize, free_map: &mut impl FreeMap) -> Result<()> {
        // 链尾节点已满：先接上新节点
        if count > 0 && self.slot == NUM_DIRECT {
            self.link(free_map)?;
        }

        for i in 0..count {
            self.node.direct[self.slot] = claim(free_map)?;
            self.slot += 1;

            if self.slot == NUM_DIRECT && i + 1 < count {
                self.link(free_map)?;
            }
        }

        self.node.flush(self.sector, self.block_device)
    }

    fn link(&mut self, free_map: &mut impl FreeMap) -> Result<()> {
        let next = claim(free_map)?;
        self.node.next = Some(next);
        self.node.flush(self.sector, self.block_device)?;
        log::trace!("index node {} linked to {next}", self.sector);

        self.sector = next;
        self.node = IndexNode::default();
        self.slot = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use block_dev::{BlockDevice, RamDisk};

    use super::*;
    use crate::{Bitmap, SECTOR_SIZE};

    fn setup() -> (Arc<dyn BlockDevice>, Bitmap) {
        (
            Arc::new(RamDisk::new(SECTOR_SIZE, 256)),
            Bitmap::new(256),
        )
    }

    #[test]
    fn append_links_nodes_in_claim_order() {
        let (dev, mut bitmap) = setup();
        let head = bitmap.alloc().unwrap();
        ChainWriter::new(head, IndexNode::default(), 0, &dev)
            .append(40, &mut bitmap)
            .unwrap();

        // 头节点0，数据1..=31，第二个节点32，数据33..=41
        let chain = IndexChain::new(head, SectorCount::new(40), &dev);
        assert_eq!(chain.head(), head);
        let nodes: Vec<_> = chain.nodes().collect::<Result<_>>().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].0, SectorId::new(0));
        assert_eq!(nodes[0].1.next, Some(SectorId::new(32)));
        assert_eq!(nodes[1].0, SectorId::new(32));
        assert_eq!(nodes[1].1.next, None);
        assert_eq!(nodes[1].1.direct[9], SectorId::UNSET);

        let data = chain.data_sectors().unwrap();
        let expected: Vec<_> = (1..=31).chain(33..=41).map(SectorId::new).collect();
        assert_eq!(data, expected);
    }

    #[test]
    fn append_to_full_tail_links_first() {
        let (dev, mut bitmap) = setup();
        let head = bitmap.alloc().unwrap();
        ChainWriter::new(head, IndexNode::default(), 0, &dev)
            .append(NUM_DIRECT, &mut bitmap)
            .unwrap();
        let tail = IndexNode::fetch(head, &dev).unwrap();
        assert_eq!(tail.next, None);

        ChainWriter::new(head, tail, NUM_DIRECT, &dev)
            .append(1, &mut bitmap)
            .unwrap();

        let chain = IndexChain::new(head, SectorCount::new(32), &dev);
        assert_eq!(chain.node_count(), 2);
        assert_eq!(chain.data_sectors().unwrap().len(), 32);
    }

    #[test]
    fn empty_chain_has_one_node() {
        let (dev, mut bitmap) = setup();
        let head = bitmap.alloc().unwrap();
        ChainWriter::new(head, IndexNode::default(), 0, &dev)
            .append(0, &mut bitmap)
            .unwrap();

        let chain = IndexChain::new(head, SectorCount::ZERO, &dev);
        assert_eq!(chain.nodes().count(), 1);
        assert!(chain.data_sectors().unwrap().is_empty());
        assert_eq!(bitmap.free_count(), 255);
    }

    #[test]
    fn missing_link_is_reported() {
        let (dev, _) = setup();
        IndexNode::default().flush(SectorId::new(4), &dev).unwrap();

        // 声称有两个节点，但首节点没有链接
        let num_sectors = SectorCount::new(NUM_DIRECT as u32 + 1);
        let chain = IndexChain::new(SectorId::new(4), num_sectors, &dev);
        let mut nodes = chain.nodes();
        assert_eq!(
            nodes.next().unwrap().unwrap_err(),
            Error::Corrupted(SectorId::new(4))
        );
        assert!(nodes.next().is_none());
    }
}
