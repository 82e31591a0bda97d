//! Data models shared by the renderer and the registration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SerialNumber;

/// One row of the applicant's education history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EducationEntry {
    pub course: String,
    pub institution: String,
    pub specialization: String,
    pub year: String,
    pub percentage: String,
}

/// Registration fields as submitted by the applicant
///
/// Every field defaults to empty so that a partially filled form still
/// deserializes; the renderer binds absent values as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistrationForm {
    pub course: String,
    pub department: String,
    pub duration: String,

    /// Applicant's full name
    pub name: String,

    /// `YYYY-MM-DD`
    pub date_of_birth: String,

    /// Salutation picked on the form (`Mr.`, `Ms.`, ...)
    pub gender: String,

    pub father_name: String,
    pub mother_name: String,
    pub address: String,
    pub mobile: String,
    pub alternate_mobile: String,
    pub email: String,

    /// National ID number
    pub national_id: String,

    pub caste_category: String,
    pub course_fee: String,

    /// Program start, `YYYY-MM-DD`
    pub start_date: String,

    /// Program end, `YYYY-MM-DD`
    pub end_date: String,

    pub education: Vec<EducationEntry>,

    /// Passport photo as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// A stamped registration, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub serial_number: SerialNumber,

    #[serde(flatten)]
    pub form: RegistrationForm,

    /// Public URL of the uploaded certificate
    pub certificate_url: Option<String>,

    /// Public URL of the uploaded application form
    pub application_form_url: Option<String>,

    /// Assigned by the server when the record is persisted
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Stamp a submitted form with its serial number
    pub fn stamp(serial_number: SerialNumber, form: RegistrationForm) -> Self {
        Self {
            serial_number,
            form,
            certificate_url: None,
            application_form_url: None,
            submitted_at: None,
        }
    }

    /// Attach the public URLs of the uploaded documents
    pub fn attach_documents(
        &mut self,
        certificate_url: Option<String>,
        application_form_url: Option<String>,
    ) {
        self.certificate_url = certificate_url;
        self.application_form_url = application_form_url;
    }

    /// Record the submission time, right before persisting
    pub fn mark_submitted(&mut self) {
        self.submitted_at = Some(Utc::now());
    }

    pub fn applicant_name(&self) -> &str {
        &self.form.name
    }
}

/// A completed submission waiting for the next faculty batch email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    pub serial_number: SerialNumber,
    pub applicant_name: String,
    pub certificate_url: Option<String>,
    pub application_form_url: Option<String>,
}

impl From<&Registration> for PendingNotification {
    fn from(registration: &Registration) -> Self {
        Self {
            serial_number: registration.serial_number,
            applicant_name: registration.form.name.clone(),
            certificate_url: registration.certificate_url.clone(),
            application_form_url: registration.application_form_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_defaults_missing_fields() {
        let form: RegistrationForm = serde_json::from_value(json!({
            "name": "Asha Rao",
            "fatherName": "Ravi Rao",
            "education": [{ "course": "B.Sc", "year": "2021" }]
        }))
        .unwrap();

        assert_eq!(form.name, "Asha Rao");
        assert_eq!(form.father_name, "Ravi Rao");
        assert_eq!(form.course, "");
        assert!(form.photo.is_none());
        assert_eq!(form.education[0].course, "B.Sc");
        assert_eq!(form.education[0].institution, "");
    }

    #[test]
    fn test_client_timestamp_is_not_trusted() {
        let form: RegistrationForm = serde_json::from_value(json!({
            "name": "Asha Rao",
            "submittedAt": "1999-01-01T00:00:00Z"
        }))
        .unwrap();

        let registration = Registration::stamp(SerialNumber::new(819), form);
        assert!(registration.submitted_at.is_none());
    }

    #[test]
    fn test_registration_lifecycle() {
        let form = RegistrationForm {
            name: "Asha Rao".to_string(),
            ..Default::default()
        };

        let mut registration = Registration::stamp(SerialNumber::new(819), form);
        assert!(registration.certificate_url.is_none());
        assert!(registration.application_form_url.is_none());

        registration.attach_documents(Some("https://cdn/cert.pdf".to_string()), None);
        registration.mark_submitted();

        assert_eq!(registration.certificate_url.as_deref(), Some("https://cdn/cert.pdf"));
        assert!(registration.application_form_url.is_none());
        assert!(registration.submitted_at.is_some());

        let pending = PendingNotification::from(&registration);
        assert_eq!(pending.applicant_name, "Asha Rao");
        assert_eq!(pending.serial_number.to_string(), "000819");
    }

    #[test]
    fn test_registration_json_shape() {
        let mut registration = Registration::stamp(
            SerialNumber::new(819),
            RegistrationForm {
                name: "Asha Rao".to_string(),
                ..Default::default()
            },
        );
        registration.mark_submitted();

        let value = serde_json::to_value(&registration).unwrap();
        assert_eq!(value["serialNumber"], "000819");
        assert_eq!(value["name"], "Asha Rao");
        assert!(value["certificateUrl"].is_null());

        let back: Registration = serde_json::from_value(value).unwrap();
        assert_eq!(back, registration);
    }
}
