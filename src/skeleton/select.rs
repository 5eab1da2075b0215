use super::{Joint, JointType, SkeletalFrame};

/// 送信対象として選ばれた関節
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// トラッキング中のボディだけを数えた通し番号。OSCアドレスのチャンネルになる。
    pub index: usize,
    /// フレーム内のボディ位置
    pub body_index: usize,
    pub joint: Joint,
}

/// フレームから、トラッキング中のボディごとに注目関節を1つ取り出す
#[derive(Debug, Clone, Copy)]
pub struct BodySelector {
    joint_id: u32,
}

impl BodySelector {
    pub fn new(joint: JointType) -> Self {
        Self { joint_id: joint.id() }
    }

    pub fn joint_id(&self) -> u32 {
        self.joint_id
    }

    /// フレーム順に選択結果を返す。
    ///
    /// 関節を持たないトラッキング中のボディは出力されないが、番号は消費する。
    /// そのため番号はトラッキングの増減でフレームごとにずれ得る。
    pub fn select<'a>(&self, frame: &'a SkeletalFrame) -> impl Iterator<Item = Selection> + 'a {
        let joint_id = self.joint_id;
        frame
            .bodies
            .iter()
            .filter(|body| body.tracked)
            .enumerate()
            .filter_map(move |(index, body)| {
                body.joint(joint_id).map(|joint| Selection {
                    index,
                    body_index: body.index,
                    joint: *joint,
                })
            })
    }
}

impl Default for BodySelector {
    fn default() -> Self {
        Self::new(JointType::SpineMid)
    }
}
