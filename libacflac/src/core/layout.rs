//! channel layout tags the codec reports for 1..8 channels

use serde::{Deserialize, Serialize};

/// layout tag, (layout id << 16) | channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelLayoutTag(pub u32);

impl ChannelLayoutTag {
    pub const MONO: Self = Self((100 << 16) | 1);
    pub const STEREO: Self = Self((101 << 16) | 2);
    /// L R C
    pub const MPEG_3_0_B: Self = Self((114 << 16) | 3);
    /// L R C Cs
    pub const MPEG_4_0_B: Self = Self((116 << 16) | 4);
    /// L R Ls Rs C
    pub const MPEG_5_0_D: Self = Self((120 << 16) | 5);
    /// L R Ls Rs C LFE
    pub const MPEG_5_1_D: Self = Self((124 << 16) | 6);
    /// L R Ls Rs C Cs LFE
    pub const AAC_6_1: Self = Self((142 << 16) | 7);
    /// L R Ls Rs C Lc Rc LFE
    pub const MPEG_7_1_B: Self = Self((127 << 16) | 8);
    pub const UNKNOWN: Self = Self(0xFFFF_0000);

    /// the layout used for a channel count, None outside 1..8
    pub fn for_channels(channels: u32) -> Option<Self> {
        SUPPORTED_LAYOUTS.get((channels as usize).checked_sub(1)?).copied()
    }

    /// channel count encoded in the low 16 bits
    pub fn channel_count(self) -> u32 {
        self.0 & 0xFFFF
    }
}

/// one layout per channel count, index = channels - 1
pub const SUPPORTED_LAYOUTS: [ChannelLayoutTag; 8] = [
    ChannelLayoutTag::MONO,
    ChannelLayoutTag::STEREO,
    ChannelLayoutTag::MPEG_3_0_B,
    ChannelLayoutTag::MPEG_4_0_B,
    ChannelLayoutTag::MPEG_5_0_D,
    ChannelLayoutTag::MPEG_5_1_D,
    ChannelLayoutTag::AAC_6_1,
    ChannelLayoutTag::MPEG_7_1_B,
];

/// a channel layout as the property surface reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub tag: ChannelLayoutTag,
    pub channel_bitmap: u32,
    pub number_descriptions: u32,
}

impl ChannelLayout {
    /// host struct size: 12 byte header plus one 20 byte channel description
    pub const BYTE_SIZE: usize = 32;

    pub fn from_tag(tag: ChannelLayoutTag) -> Self {
        ChannelLayout {
            tag,
            channel_bitmap: 0,
            number_descriptions: 0,
        }
    }
}
