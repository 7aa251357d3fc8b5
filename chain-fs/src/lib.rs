//! # chain-fs
//!
//! 教学用文件系统的文件元数据与块分配层：
//! 每个文件由一个占满一扇区的**文件头**描述，
//! 文件头指向一条由定长**索引节点**串成的单链表，
//! 索引节点依次记录文件各数据扇区的编号。
//!
//! 库内不加锁，所有修改操作都要求 `&mut`，并发访问须由调用者串行化。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* chain-fs 的整体架构，自上而下 */

// 卷：超级块、空闲位图，以及文件头的创建、打开、扩容与删除
mod volume;
pub use volume::Volume;

// 文件头层：分配、回收、地址翻译、原地扩容、持久化
mod header;
pub use header::FileHeader;

// 索引链：文件的物理块映射
mod chain;
pub use chain::{IndexChain, Nodes};

// 空闲扇区表接口
mod free_map;
pub use free_map::FreeMap;

// 磁盘数据结构层
mod layout;
pub use layout::{Bitmap, FileKind, IndexNode};

// 扇区编号与计量单位
mod sector;
pub use sector::{ByteCount, ByteOffset, SectorCount, SectorId};

mod error;
pub use error::{Error, Result};

pub const SECTOR_SIZE: usize = 128;
/// 每个索引节点的数据扇区槽位数：一个扇区放得下的编号个数，减去留给链接的一个
pub const NUM_DIRECT: usize = SECTOR_SIZE / core::mem::size_of::<u32>() - 1;

type DataSector = [u8; SECTOR_SIZE];
