use std::fmt;

/// The two documents produced for every registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Course completion certificate, A4 landscape
    Certificate,
    /// Filled-in application form, A4 portrait
    ApplicationForm,
}

impl DocumentKind {
    /// Stable identifier used in asset and output file names
    pub fn slug(&self) -> &'static str {
        match self {
            DocumentKind::Certificate => "certificate",
            DocumentKind::ApplicationForm => "application-form",
        }
    }

    pub fn template_file(&self) -> String {
        format!("{}.html", self.slug())
    }

    pub fn stylesheet_file(&self) -> String {
        format!("{}.css", self.slug())
    }

    pub fn landscape(&self) -> bool {
        matches!(self, DocumentKind::Certificate)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
