//! Carimbo de data/hora compactado usado pelo download web.
//!
//! ```text
//! data = dia + mês * 32 + (ano - 2000) * 512
//! hora = minuto + hora * 100
//! carimbo = (data << 16) + hora
//! ```

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Compacta uma data/hora no formato do console. Segundos são descartados.
pub fn to_packed(datetime: NaiveDateTime) -> i32 {
    let date = pack_date(datetime.date());
    let time = datetime.minute() as i32 + datetime.hour() as i32 * 100;
    (date << 16) + time
}

/// Parte de data (16 bits altos) do carimbo.
pub fn pack_date(date: NaiveDate) -> i32 {
    date.day() as i32 + date.month() as i32 * 32 + (date.year() - 2000) * 512
}

/// Reconstrói a data/hora a partir das duas metades do carimbo.
///
/// Retorna `None` se alguma das partes não formar uma data válida.
pub fn from_parts(date_stamp: i32, time_stamp: i32) -> Option<NaiveDateTime> {
    if date_stamp < 0 || time_stamp < 0 {
        return None;
    }
    let year = date_stamp / 512 + 2000;
    let month = (date_stamp % 512) / 32;
    let day = date_stamp % 32;
    let hour = time_stamp / 100;
    let minute = time_stamp % 100;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)?.and_hms_opt(hour as u32, minute as u32, 0)
}

/// Inverso de [`to_packed`].
pub fn from_packed(timestamp: i32) -> Option<NaiveDateTime> {
    from_parts(timestamp >> 16, timestamp & 0xFFFF)
}
