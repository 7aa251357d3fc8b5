use binrw::binrw;

/// 超级块：
/// - 魔数校验卷的合法性；
/// - 记录卷的总扇区数与位图占用的扇区数
#[binrw]
#[brw(little, magic = b"CHFS")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub total_sectors: u32,
    pub bitmap_sectors: u32,
}
