use derive_more::Display;

use crate::{ByteCount, ByteOffset, SectorCount, SectorId};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    /// 空闲扇区数低于保守的容量需求，未占用任何扇区
    #[display(
        fmt = "not enough free sectors: {} required, {} available",
        required,
        available
    )]
    InsufficientSpace {
        required: SectorCount,
        available: SectorCount,
    },

    /// 偏移不在 `[0, length)` 之内
    #[display(fmt = "offset {} is outside a file of {} bytes", offset, length)]
    InvalidOffset {
        offset: ByteOffset,
        length: ByteCount,
    },

    /// 文件长度超出 `u32` 的表示范围
    #[display(fmt = "file length would overflow the header's size field")]
    FileTooLarge,

    /// 扇区内容不是预期的记录
    #[display(fmt = "sector {} does not hold a valid record", _0)]
    Corrupted(SectorId),
}

impl core::error::Error for Error {}
