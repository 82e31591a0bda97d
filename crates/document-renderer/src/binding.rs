//! Field binding between a registration and a document template
//!
//! Binding contract, version [`BINDING_VERSION`]:
//!
//! - an element whose `id` is a field key receives the value: `input`
//!   elements through their `value` attribute, everything else as text
//! - `input[type=radio]` elements whose `name` is a field key are checked
//!   when their `value` matches the field (case-insensitive)
//! - `img#photo` gets the applicant photo when it is an inline PNG, JPEG,
//!   GIF or WebP data URL, and is removed otherwise
//! - `img` elements whose `src` names a logo file get the inlined logo
//! - education rows use `education-{n}-{column}` keys, `n` starting at 1
//!
//! The stylesheet and a `registrar-binding` meta tag are appended to `<head>`.

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use registrar_common::dates::to_day_month_year;
use registrar_common::Registration;
use std::collections::BTreeMap;
use tracing::warn;

use crate::assets::LoadedTemplate;
use crate::error::{RenderError, Result};
use crate::kind::DocumentKind;

/// Version of the id/name contract between templates and records
pub const BINDING_VERSION: u32 = 1;

/// Element id of the applicant photo
pub const PHOTO_ID: &str = "photo";

/// The only photo sources the renderer will load; anything else could make
/// the browser fetch a URL or read a local file
const INLINE_PHOTO_PREFIXES: &[&str] = &[
    "data:image/png;base64,",
    "data:image/jpeg;base64,",
    "data:image/gif;base64,",
    "data:image/webp;base64,",
];

/// Whether `src` is an inline image the renderer may embed
pub fn is_inline_photo(src: &str) -> bool {
    let src = src.trim_start();
    INLINE_PHOTO_PREFIXES.iter().any(|prefix| {
        src.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Scalar field keys every template may bind
pub const FIELD_KEYS: &[&str] = &[
    "serial-number",
    "course",
    "department",
    "duration",
    "name",
    "date-of-birth",
    "gender",
    "father-name",
    "mother-name",
    "address",
    "mobile",
    "alternate-mobile",
    "email",
    "national-id",
    "caste-category",
    "course-fee",
    "start-date",
    "end-date",
    "relation",
    "certificate-text",
];

/// Columns of an education row, in key order
pub const EDUCATION_COLUMNS: &[&str] = &[
    "course",
    "institution",
    "specialization",
    "year",
    "percentage",
];

/// Field key to bound value
pub type FieldMap = BTreeMap<String, String>;

/// Relation phrase printed between the applicant's and father's names
pub fn relation_phrase(gender: &str) -> &'static str {
    match gender.trim() {
        "Mr." => "S/o",
        "Ms." => "D/o",
        _ => "S/o / D/o",
    }
}

/// Body sentence of the certificate
pub fn certificate_text(registration: &Registration) -> String {
    let form = &registration.form;
    let sentence = format!(
        "This is to certify that {} {} {} {} has successfully completed the {} {} program \
         in the Department of {} from {} to {}.",
        form.gender.trim(),
        form.name.trim(),
        relation_phrase(&form.gender),
        form.father_name.trim(),
        form.duration.trim(),
        form.course.trim(),
        form.department.trim(),
        to_day_month_year(form.start_date.trim()),
        to_day_month_year(form.end_date.trim()),
    );

    sentence.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the field values bound into a template
///
/// Certificates print dates as `DD-MM-YYYY`; the application form keeps them
/// as submitted.
pub fn field_map(kind: DocumentKind, registration: &Registration) -> FieldMap {
    let form = &registration.form;
    let date = |value: &str| match kind {
        DocumentKind::Certificate => to_day_month_year(value),
        DocumentKind::ApplicationForm => value.to_string(),
    };

    let mut fields = FieldMap::new();
    let mut put = |key: &str, value: String| {
        fields.insert(key.to_string(), value);
    };

    put("serial-number", registration.serial_number.to_string());
    put("course", form.course.clone());
    put("department", form.department.clone());
    put("duration", form.duration.clone());
    put("name", form.name.clone());
    put("date-of-birth", date(&form.date_of_birth));
    put("gender", form.gender.clone());
    put("father-name", form.father_name.clone());
    put("mother-name", form.mother_name.clone());
    put("address", form.address.clone());
    put("mobile", form.mobile.clone());
    put("alternate-mobile", form.alternate_mobile.clone());
    put("email", form.email.clone());
    put("national-id", form.national_id.clone());
    put("caste-category", form.caste_category.clone());
    put("course-fee", form.course_fee.clone());
    put("start-date", date(&form.start_date));
    put("end-date", date(&form.end_date));

    if kind == DocumentKind::Certificate {
        put("relation", relation_phrase(&form.gender).to_string());
        put("certificate-text", certificate_text(registration));
    }

    for (index, entry) in form.education.iter().enumerate() {
        let row = index + 1;
        let values = [
            &entry.course,
            &entry.institution,
            &entry.specialization,
            &entry.year,
            &entry.percentage,
        ];
        for (column, value) in EDUCATION_COLUMNS.iter().zip(values) {
            put(&format!("education-{}-{}", row, column), value.clone());
        }
    }

    fields
}

/// Compose a self-contained HTML document from a loaded template
pub fn compose(
    template: &LoadedTemplate,
    fields: &FieldMap,
    photo: Option<&str>,
) -> Result<String> {
    let head_extra = format!(
        "<meta name=\"registrar-binding\" content=\"{}\"><style>{}</style>",
        BINDING_VERSION, template.stylesheet
    );
    let mut head_found = false;

    let handlers = vec![
        element!("head", |el| {
            head_found = true;
            el.append(&head_extra, ContentType::Html);
            Ok(())
        }),
        element!("img[src]", |el| {
            let src = el.get_attribute("src").unwrap_or_default();
            if let Some(logo) = template.logos.iter().find(|l| l.file_name == src) {
                el.set_attribute("src", &logo.data_uri)?;
            }
            Ok(())
        }),
        element!("input[name]", |el| {
            let is_radio = el
                .get_attribute("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("radio"));
            if !is_radio {
                return Ok(());
            }

            let name = el.get_attribute("name").unwrap_or_default();
            let Some(selected) = fields.get(&name) else {
                return Ok(());
            };

            let value = el.get_attribute("value").unwrap_or_default();
            if !selected.trim().is_empty() && value.trim().eq_ignore_ascii_case(selected.trim()) {
                el.set_attribute("checked", "checked")?;
            } else {
                el.remove_attribute("checked");
            }
            Ok(())
        }),
        element!("[id]", |el| {
            let id = el.get_attribute("id").unwrap_or_default();
            let tag = el.tag_name();

            if tag == "img" {
                if id == PHOTO_ID {
                    match photo.map(str::trim).filter(|src| !src.is_empty()) {
                        Some(src) if is_inline_photo(src) => el.set_attribute("src", src)?,
                        Some(_) => {
                            warn!("Dropping photo that is not an inline image");
                            el.remove();
                        }
                        None => el.remove(),
                    }
                }
                return Ok(());
            }

            let Some(value) = fields.get(&id) else {
                return Ok(());
            };

            if tag == "input" {
                let input_type = el.get_attribute("type").unwrap_or_default();
                if !input_type.eq_ignore_ascii_case("radio")
                    && !input_type.eq_ignore_ascii_case("checkbox")
                {
                    el.set_attribute("value", value)?;
                }
            } else {
                el.set_inner_content(value, ContentType::Text);
            }
            Ok(())
        }),
    ];

    let composed = rewrite_str(
        &template.html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| RenderError::Binding(e.to_string()))?;

    if !head_found {
        return Err(RenderError::Template(
            "template has no <head> element for the stylesheet".to_string(),
        ));
    }

    Ok(composed)
}
