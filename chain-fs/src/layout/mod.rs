//! # 磁盘数据结构层
//!
//! chain-fs 卷的磁盘布局：
//! 超级块 | 空闲位图 | 文件头、索引节点与数据扇区（混合分配）
//!
//! 每种记录都恰好占一个扇区，按小端序编码；
//! 内存中的类型与磁盘格式分离，编解码经由 [`binrw`]。

mod super_block;
pub use super_block::SuperBlock;

mod bitmap;
pub use bitmap::Bitmap;

mod header;
pub use header::{DiskHeader, FileKind};

mod index_node;
pub use index_node::IndexNode;

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, Endian};

use crate::{DataSector, Error, Result, SECTOR_SIZE, SectorId};

/// 把 `sector` 扇区的内容解码为一条记录
pub(crate) fn decode<T>(data: &DataSector, sector: SectorId) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_options(&mut Cursor::new(&data[..]), Endian::Little, ()).map_err(|err| {
        log::warn!("sector {sector}: {err}");
        Error::Corrupted(sector)
    })
}

/// 把记录编码成将写入 `sector` 的扇区内容，余下字节补零
pub(crate) fn encode<T>(record: &T, sector: SectorId) -> Result<DataSector>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut data = [0; SECTOR_SIZE];
    record
        .write_options(&mut Cursor::new(&mut data[..]), Endian::Little, ())
        .map_err(|err| {
            log::warn!("sector {sector}: {err}");
            Error::Corrupted(sector)
        })?;
    Ok(data)
}
