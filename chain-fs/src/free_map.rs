//! # 空闲扇区表
//!
//! 文件头只通过 [`FreeMap`] 占用与释放扇区；
//! 扇区的“已分配”位是其归属的唯一标记。

use crate::{Bitmap, Error, Result, SectorCount, SectorId};

pub trait FreeMap {
    /// 占用一个空闲扇区并返回其编号；没有空闲扇区时返回空
    fn find(&mut self) -> Option<SectorId>;

    /// 释放一个扇区
    fn clear(&mut self, id: SectorId);

    /// 空闲扇区数
    fn num_clear(&self) -> SectorCount;
}

impl FreeMap for Bitmap {
    #[inline]
    fn find(&mut self) -> Option<SectorId> {
        self.alloc()
    }

    #[inline]
    fn clear(&mut self, id: SectorId) {
        self.dealloc(id);
    }

    #[inline]
    fn num_clear(&self) -> SectorCount {
        SectorCount::new(self.free_count() as u32)
    }
}

/// 在占用任何扇区之前检查容量
pub(crate) fn reserve(free_map: &impl FreeMap, required: SectorCount) -> Result<()> {
    let available = free_map.num_clear();
    if available < required {
        log::debug!("need {required} free sectors, only {available} left");
        return Err(Error::InsufficientSpace {
            required,
            available,
        });
    }
    Ok(())
}

/// 占用一个扇区；容量已预先检查过，正常情况下不会失败
pub(crate) fn claim(free_map: &mut impl FreeMap) -> Result<SectorId> {
    free_map.find().ok_or(Error::InsufficientSpace {
        required: SectorCount::new(1),
        available: SectorCount::ZERO,
    })
}
