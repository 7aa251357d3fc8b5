//! # 扇区编号与计量单位
//!
//! 物理扇区号、扇区个数、字节偏移、字节数各用一种类型，
//! 单位之间只能经由这里的换算函数转换。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use derive_more::{Add, AddAssign, Display, From, Into, Sub, SubAssign};

use crate::{DataSector, NUM_DIRECT, SECTOR_SIZE};

/// 物理扇区号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct SectorId(u32);

impl SectorId {
    /// 磁盘上表示“空槽位”的编号
    pub const UNSET: Self = Self(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// 交给块设备的块ID
    #[inline]
    pub fn block(self) -> usize {
        self.0 as usize
    }
}

/// 扇区个数，也用作文件内数据扇区的逻辑索引
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    Display,
    From,
    Into,
)]
pub struct SectorCount(u32);

impl SectorCount {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// 记录这么多数据扇区需要几个索引节点
    #[inline]
    pub fn index_nodes(self) -> usize {
        self.as_usize().div_ceil(NUM_DIRECT)
    }

    /// 保守的容量需求：每组都按 `NUM_DIRECT` 个数据扇区加一个索引扇区计，
    /// 最后一组即使没填满也一样
    #[inline]
    pub fn reservation(self) -> Self {
        Self((self.index_nodes() * (NUM_DIRECT + 1)) as u32)
    }
}

/// 文件内的字节偏移
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct ByteOffset(u32);

impl ByteOffset {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// 偏移所在数据扇区的逻辑索引
    #[inline]
    pub fn sector_index(self) -> usize {
        self.as_usize() / SECTOR_SIZE
    }
}

/// 字节数（文件长度、增长量）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct ByteCount(u32);

impl ByteCount {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// 容纳这么多字节需要几个数据扇区
    #[inline]
    pub fn sectors(self) -> SectorCount {
        SectorCount(self.0.div_ceil(SECTOR_SIZE as u32))
    }

    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// 偏移是否落在 `[0, self)` 之内
    #[inline]
    pub fn contains(self, offset: ByteOffset) -> bool {
        offset.0 < self.0
    }
}

pub(crate) fn read(id: SectorId, block_device: &Arc<dyn BlockDevice>) -> DataSector {
    let mut data = [0; SECTOR_SIZE];
    block_device.read_block(id.block(), &mut data);
    data
}

pub(crate) fn write(id: SectorId, data: &DataSector, block_device: &Arc<dyn BlockDevice>) {
    block_device.write_block(id.block(), data);
}
