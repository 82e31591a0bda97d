//! Spreadsheet export of all registrations

use chrono::{DateTime, Local, TimeZone};
use registrar_common::Registration;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

/// Header row, in column order
pub const COLUMNS: [&str; 21] = [
    "Serial Number",
    "Submission Date",
    "Name",
    "Course",
    "Department",
    "Duration",
    "Start Date",
    "End Date",
    "Mobile",
    "Alternate Mobile",
    "Email",
    "Date of Birth",
    "Gender",
    "Father's Name",
    "Mother's Name",
    "Address",
    "National ID",
    "Caste Category",
    "Course Fee",
    "Certificate URL",
    "Application Form URL",
];

pub const SHEET_NAME: &str = "Registrations";

/// Cell values for one registration, matching [`COLUMNS`]
pub fn registration_row(registration: &Registration) -> [String; 21] {
    let form = &registration.form;
    let submitted = registration
        .submitted_at
        .map(|t| t.with_timezone(&Local).format("%d-%m-%Y %H:%M").to_string())
        .unwrap_or_default();

    [
        registration.serial_number.to_string(),
        submitted,
        form.name.clone(),
        form.course.clone(),
        form.department.clone(),
        form.duration.clone(),
        form.start_date.clone(),
        form.end_date.clone(),
        form.mobile.clone(),
        form.alternate_mobile.clone(),
        form.email.clone(),
        form.date_of_birth.clone(),
        form.gender.clone(),
        form.father_name.clone(),
        form.mother_name.clone(),
        form.address.clone(),
        form.national_id.clone(),
        form.caste_category.clone(),
        form.course_fee.clone(),
        registration.certificate_url.clone().unwrap_or_default(),
        registration.application_form_url.clone().unwrap_or_default(),
    ]
}

/// Build the workbook in memory and return the `.xlsx` bytes
pub fn build_workbook(registrations: &[Registration]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, title) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (index, registration) in registrations.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, value) in registration_row(registration).iter().enumerate() {
            worksheet.write_string(row, col as u16, value.as_str())?;
        }
    }

    workbook.save_to_buffer()
}

/// Attachment name for an export taken at `at`
pub fn export_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("registrations_{}.xlsx", at.format("%Y-%m-%d_%H%M"))
}
