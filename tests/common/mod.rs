#![allow(dead_code)]

use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::{Map, Value};
use xlstock::error::GeoIpError;
use xlstock::events::GeoIpLookup;

/// Build an XLSX upload. Cells that parse as numbers are written as numbers,
/// blank cells are skipped and everything else is written as text.
pub fn workbook(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, header) in headers.iter().enumerate() {
        worksheet.write_string(0, c as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = ((r + 1) as u32, c as u16);
            if cell.is_empty() {
                continue;
            }
            match cell.parse::<f64>() {
                Ok(number) => worksheet.write_number(r, c, number).unwrap(),
                Err(_) => worksheet.write_string(r, c, *cell).unwrap(),
            };
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().unwrap()
}

/// Geo-IP lookup returning a fixed answer, or failing when given `None`.
pub struct StubGeoIp(pub Option<Map<String, Value>>);

impl StubGeoIp {
    pub fn answering(info: Value) -> Self {
        match info {
            Value::Object(map) => StubGeoIp(Some(map)),
            _ => panic!("stub geo-IP answer must be an object"),
        }
    }

    pub fn failing() -> Self {
        StubGeoIp(None)
    }
}

impl GeoIpLookup for StubGeoIp {
    async fn lookup(&self) -> Result<Map<String, Value>, GeoIpError> {
        self.0.clone().ok_or(GeoIpError::NotAnObject)
    }
}
