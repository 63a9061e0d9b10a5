use crate::selection::Service;
use crate::transform::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Document,
    Video,
    Audio,
    Other,
}

/// Classifies a file by extension. Returns the kind and the lowercased extension.
pub fn classify(file_name: &str) -> (FileKind, String) {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    };
    let kind = match ext.as_str() {
        "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif" | "tiff" => FileKind::Image,
        "pdf" | "doc" | "docx" | "txt" | "rtf" => FileKind::Document,
        "mp4" | "avi" | "mov" | "mkv" | "wmv" => FileKind::Video,
        "mp3" | "wav" | "flac" | "aac" | "m4a" => FileKind::Audio,
        _ => FileKind::Other,
    };
    (kind, ext)
}

/// Actions shown on the menu for an upload, narrowed to the selected service
/// when there is one.
pub fn available_actions(file_name: &str, service: Option<Service>) -> Vec<Action> {
    let (kind, ext) = classify(file_name);
    let mut actions = Vec::new();

    match kind {
        FileKind::Image => {
            if ext != "jpg" && ext != "jpeg" {
                actions.push(Action::ToJpg);
            }
            if ext != "png" {
                actions.push(Action::ToPng);
            }
            if ext != "webp" {
                actions.push(Action::ToWebp);
            }
            actions.push(Action::CompressImage);
        }
        FileKind::Document if ext == "pdf" => actions.push(Action::CompressPdf),
        FileKind::Video => actions.push(Action::ExtractAudio),
        _ => {}
    }
    actions.push(Action::Zip);

    if let Some(service) = service {
        actions.retain(|a| service.offers(*a));
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("Photo.JPG"), (FileKind::Image, "jpg".to_string()));
        assert_eq!(classify("report.final.pdf").0, FileKind::Document);
        assert_eq!(classify("clip.mkv").0, FileKind::Video);
        assert_eq!(classify("song.flac").0, FileKind::Audio);
        assert_eq!(classify("README"), (FileKind::Other, String::new()));
    }

    #[test]
    fn test_image_menu_skips_own_format() {
        let actions = available_actions("cat.png", None);
        assert_eq!(
            actions,
            vec![Action::ToJpg, Action::ToWebp, Action::CompressImage, Action::Zip]
        );
        assert!(!available_actions("cat.jpeg", None).contains(&Action::ToJpg));
    }

    #[test]
    fn test_menu_filtered_by_service() {
        assert_eq!(
            available_actions("doc.pdf", Some(Service::Compress)),
            vec![Action::CompressPdf]
        );
        assert_eq!(
            available_actions("movie.mp4", Some(Service::ExtractAudio)),
            vec![Action::ExtractAudio]
        );
        assert_eq!(available_actions("notes.txt", None), vec![Action::Zip]);
    }
}
