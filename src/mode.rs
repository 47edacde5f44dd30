//! Analysis modes offered in the selector.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Labels,
    TextDetection,
    FaceDetection,
}

impl Mode {
    /// Selector order.
    pub const ALL: [Mode; 3] = [Mode::Labels, Mode::TextDetection, Mode::FaceDetection];

    /// Label shown in the mode selector.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Labels => "Labels",
            Mode::TextDetection => "Text Detection",
            Mode::FaceDetection => "Face Detection",
        }
    }

    /// Value sent as `mode` in the request payload.
    pub fn api_code(self) -> &'static str {
        match self {
            Mode::Labels => "labels",
            Mode::TextDetection => "TEXT_DETECTION",
            Mode::FaceDetection => "FACE_DETECTION",
        }
    }

    pub fn from_name(name: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Whether replies in this mode produce bounding polygons.
    pub fn draws_polygons(self) -> bool {
        !matches!(self, Mode::Labels)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
