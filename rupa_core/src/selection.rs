//! Per-user "which service did they pick" marker.

use dashmap::DashMap;

use crate::files::kind::FileKind;
use crate::lang::Texts;
use crate::transform::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Service {
    Convert,
    Compress,
    ExtractAudio,
    Zip,
    MergePdf,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Convert,
        Service::Compress,
        Service::ExtractAudio,
        Service::Zip,
        Service::MergePdf,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Service::Convert => "convert",
            Service::Compress => "compress",
            Service::ExtractAudio => "audio",
            Service::Zip => "zip",
            Service::MergePdf => "merge",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.token() == token)
    }

    pub fn label(self, texts: &Texts) -> &'static str {
        match self {
            Service::Convert => texts.svc_convert,
            Service::Compress => texts.svc_compress,
            Service::ExtractAudio => texts.svc_audio,
            Service::Zip => texts.svc_zip,
            Service::MergePdf => texts.svc_merge,
        }
    }

    /// Whether an upload of this kind can be used with the service.
    pub fn accepts(self, kind: FileKind, ext: &str) -> bool {
        match self {
            Service::Convert => kind == FileKind::Image,
            Service::Compress => kind == FileKind::Image || ext == "pdf",
            Service::ExtractAudio => kind == FileKind::Video,
            Service::Zip => true,
            Service::MergePdf => ext == "pdf",
        }
    }

    pub fn offers(self, action: Action) -> bool {
        match self {
            Service::Convert => matches!(action, Action::ToJpg | Action::ToPng | Action::ToWebp),
            Service::Compress => matches!(action, Action::CompressImage | Action::CompressPdf),
            Service::ExtractAudio => action == Action::ExtractAudio,
            Service::Zip => action == Action::Zip,
            Service::MergePdf => false,
        }
    }
}

#[derive(Default)]
pub struct ServiceSelection {
    selected: DashMap<i64, Service>,
}

impl ServiceSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, user_id: i64, service: Service) {
        self.selected.insert(user_id, service);
    }

    pub fn get(&self, user_id: i64) -> Option<Service> {
        self.selected.get(&user_id).map(|s| *s)
    }

    pub fn clear(&self, user_id: i64) {
        self.selected.remove(&user_id);
    }
}
