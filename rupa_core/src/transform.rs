use async_trait::async_trait;

use crate::error::RupaResult;
use crate::lang::Texts;

/// Single-file actions offered on the action menu. The numeric code is what
/// travels in the button payload (`<code>_<recordId>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    ToJpg,
    ToPng,
    ToWebp,
    CompressImage,
    CompressPdf,
    ExtractAudio,
    Zip,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ToJpg,
        Action::ToPng,
        Action::ToWebp,
        Action::CompressImage,
        Action::CompressPdf,
        Action::ExtractAudio,
        Action::Zip,
    ];

    pub fn code(self) -> u8 {
        match self {
            Action::ToJpg => 1,
            Action::ToPng => 2,
            Action::ToWebp => 3,
            Action::CompressImage => 4,
            Action::CompressPdf => 5,
            Action::ExtractAudio => 6,
            Action::Zip => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }

    pub fn label(self, texts: &Texts) -> &'static str {
        match self {
            Action::ToJpg => texts.convert_jpg,
            Action::ToPng => texts.convert_png,
            Action::ToWebp => texts.convert_webp,
            Action::CompressImage => texts.compress_img,
            Action::CompressPdf => texts.compress_pdf,
            Action::ExtractAudio => texts.extract_mp3,
            Action::Zip => texts.zip_file,
        }
    }

    /// Name of the document sent back to the user.
    pub fn output_name(self) -> &'static str {
        match self {
            Action::ToJpg => "converted.jpg",
            Action::ToPng => "converted.png",
            Action::ToWebp => "converted.webp",
            Action::CompressImage => "compressed.jpg",
            Action::CompressPdf => "compressed.pdf",
            Action::ExtractAudio => "audio.mp3",
            Action::Zip => "compressed.zip",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformOutput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Format conversion, compression and merging. Implementations report their
/// own failures as `RupaError::TransformFailed`.
#[async_trait]
pub trait Transformer: Send + Sync + 'static {
    async fn apply(
        &self,
        action: Action,
        file_name: &str,
        input: Vec<u8>,
    ) -> RupaResult<TransformOutput>;

    async fn merge_documents(&self, inputs: Vec<Vec<u8>>) -> RupaResult<Vec<u8>>;
}
