//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、光盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 读写都是同步的：调用返回时传输已经完成，没有超时也不能取消。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod ram_disk;

use core::any::Any;

pub use self::ram_disk::RamDisk;

/// 块设备驱动特质
///
/// `buf` 的长度恰为一块；块的大小由上层文件系统约定。
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]);
    fn write_block(&self, block_id: usize, buf: &[u8]);
}
