use binrw::binrw;
use enumflags2::{BitFlags, bitflags};

/// 文件头在磁盘上的格式
#[binrw]
#[brw(little, magic = b"CHFH")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskHeader {
    /// [`FileKind`] 的位值
    pub kind: u32,
    pub created: u64,
    pub modified: u64,
    pub opened: u64,
    pub num_bytes: u32,
    pub num_sectors: u32,
    pub first_index_sector: u32,
}

/// 文件类型标签，取值同 `st_mode` 的类型位
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Directory = 0o040000,
    File = 0o100000,
}

impl FileKind {
    /// 磁盘上的值必须恰好是一种类型
    pub fn from_raw(raw: u32) -> Option<Self> {
        BitFlags::<Self>::from_bits(raw).ok()?.exactly_one()
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self as u32
    }
}
