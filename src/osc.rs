use rosc::{encoder, OscError, OscMessage, OscPacket, OscType};

use crate::mapping::MappedPosition;

/// デフォルトのアドレスプレフィックス（フロントカメラ）
pub const DEFAULT_ADDRESS_PREFIX: &str = "/pos/front";

/// 正規化に使う表示サイズ（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl DisplaySize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 表示座標をOSC位置メッセージに変換する
///
/// アドレス: `<prefix>/<index>`
/// 引数: x / width, y / height (float32 2つ、範囲チェックなし)
#[derive(Debug, Clone)]
pub struct PositionEncoder {
    prefix: String,
}

impl PositionEncoder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn address(&self, index: usize) -> String {
        format!("{}/{}", self.prefix, index)
    }

    pub fn encode(&self, index: usize, mapped: MappedPosition, display: DisplaySize) -> OscMessage {
        OscMessage {
            addr: self.address(index),
            args: vec![
                OscType::Float(mapped.x / display.width as f32),
                OscType::Float(mapped.y / display.height as f32),
            ],
        }
    }
}

impl Default for PositionEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_PREFIX)
    }
}

/// OSCメッセージをUDPペイロードにエンコード
pub fn encode_packet(msg: &OscMessage) -> Result<Vec<u8>, OscError> {
    encoder::encode(&OscPacket::Message(msg.clone()))
}
