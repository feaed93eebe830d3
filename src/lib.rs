#![forbid(unsafe_code)]

//! Story-to-video production: segment narration text, render scene images
//! on the CPU, lay them on a timeline against the synthesized audio, and
//! compose the result into an H.264/AAC video with burned-in subtitles.

pub mod canvas;
pub mod compose;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scene_render;
pub mod segment;
pub mod speech;
pub mod story;
pub mod subtitle;
pub mod timeline;

pub use canvas::{SceneCanvas, SceneFont, TextBrush};
pub use compose::{compose_video, concat_manifest, is_ffmpeg_on_path, mix_background_music};
pub use config::VideoRenderConfig;
pub use error::{StoryreelError, StoryreelResult};
pub use pipeline::VideoPipeline;
pub use scene_render::{render_scenes, SceneRenderer};
pub use segment::segment_text;
pub use speech::{PiperSpeech, SpeechSynthesizer, VoiceTable};
pub use story::{GeneratedStory, StoryConfig, StoryPrompts, TextGenerator};
pub use subtitle::{build_srt, burn_subtitles, format_srt_time};
pub use timeline::{build_timeline, Scene};
