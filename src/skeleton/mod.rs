pub mod body;
pub mod joint;
pub mod select;

pub use body::{Body, Joint, SkeletalFrame, BODY_COUNT};
pub use joint::JointType;
pub use select::{BodySelector, Selection};
