//! Hint-driven decoder selection
//!
//! Exactly one decoder is chosen from the caller's hint. There is no content
//! sniffing: an unknown hint fails with [`LogError::UnsupportedFormat`](crate::LogError::UnsupportedFormat)
//! before any byte is looked at.

use tracing::{debug, info};

use crate::config::DecodeOptions;
use crate::dataflash::DataflashDecoder;
use crate::decoder::{DecodeStats, LogDecoder};
use crate::index::MessageIndex;
use crate::mavlink::MavlinkDecoder;
use crate::types::FormatKind;
use crate::vendor::VendorDecoder;
use crate::Result;

/// Build the decoder for `kind`.
///
/// `hint` only matters for MAVLink, where it decides whether frames carry a
/// timestamp prefix when the options leave that open.
pub fn decoder_for(kind: FormatKind, hint: &str, options: &DecodeOptions) -> Result<Box<dyn LogDecoder>> {
    let decoder: Box<dyn LogDecoder> = match kind {
        FormatKind::Dataflash => Box::new(DataflashDecoder::new(options)),
        FormatKind::Mavlink => {
            let prefixed =
                options.timestamp_prefix.unwrap_or_else(|| FormatKind::default_timestamp_prefix(hint));
            debug!("MAVLink decoder, timestamp prefix: {}", prefixed);
            Box::new(
                MavlinkDecoder::new(options.resolve_dictionary()?)
                    .with_timestamp_prefix(prefixed)
                    .with_max_resync_distance(options.max_resync_distance),
            )
        }
        FormatKind::Vendor => Box::new(VendorDecoder::new()),
    };
    Ok(decoder)
}

/// Decode a whole buffer into a fresh index on the current thread.
pub fn decode_buffer(
    data: &[u8],
    hint: &str,
    options: &DecodeOptions,
) -> Result<(MessageIndex, DecodeStats)> {
    options.validate()?;
    let kind = FormatKind::from_hint(hint)?;
    let mut decoder = decoder_for(kind, hint, options)?;

    let file_name = options.file_name.clone().unwrap_or_else(|| hint.to_string());
    let mut index = MessageIndex::new(file_name, data.len() as u64, kind);
    let stats = decoder.decode(data, &mut index)?;

    info!(
        "Decoded {} {} records of {} types from {} bytes",
        stats.records,
        kind,
        index.loaded_types().len(),
        data.len()
    );
    Ok((index, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_dataflash_log, sample_tlog, sample_vendor_log, MavlinkBuilder};
    use crate::types::Value;
    use crate::LogError;

    #[test]
    fn hint_selects_decoder() {
        let options = DecodeOptions::default();
        for (hint, kind) in [("bin", FormatKind::Dataflash), ("x.tlog", FormatKind::Mavlink), ("dat", FormatKind::Vendor)]
        {
            let decoder = decoder_for(FormatKind::from_hint(hint).unwrap(), hint, &options).unwrap();
            assert_eq!(decoder.format(), kind);
        }
    }

    #[test]
    fn unknown_hint_fails_before_decoding() {
        let err = decode_buffer(&sample_dataflash_log(2), "csv", &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, LogError::UnsupportedFormat { .. }));
    }

    #[test]
    fn decodes_each_format() {
        let options = DecodeOptions::default();

        let (index, stats) = decode_buffer(&sample_dataflash_log(10), "bin", &options).unwrap();
        assert_eq!(index.records_of_type("ATT").len(), 10);
        assert_eq!(stats.records, index.len());

        let (index, _) = decode_buffer(&sample_tlog(10), "tlog", &options).unwrap();
        assert_eq!(index.records_of_type("ATTITUDE").len(), 10);
        assert_eq!(index.format(), FormatKind::Mavlink);

        let (index, _) = decode_buffer(&sample_vendor_log(10), "dat", &options).unwrap();
        assert_eq!(index.records_of_type("OSD").len(), 10);
    }

    #[test]
    fn raw_mavlink_hint_disables_prefix() {
        let mut stream = MavlinkBuilder::raw();
        stream.message(0, "ATTITUDE", &[("time_boot_ms", Value::UInt32(250))]);
        stream.message(0, "ATTITUDE", &[("time_boot_ms", Value::UInt32(500))]);

        let (index, _) = decode_buffer(&stream.build(), "mavlink", &DecodeOptions::default()).unwrap();
        let times: Vec<u64> = index.records_of_type("ATTITUDE").iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![250_000, 500_000]);
    }

    #[test]
    fn file_name_defaults_to_hint() {
        let (index, _) = decode_buffer(&sample_dataflash_log(1), "00000042.BIN", &DecodeOptions::default()).unwrap();
        assert_eq!(index.metadata_snapshot().file_name, "00000042.BIN");

        let options = DecodeOptions::default().with_file_name("flight.bin");
        let (index, _) = decode_buffer(&sample_dataflash_log(1), "bin", &options).unwrap();
        assert_eq!(index.metadata_snapshot().file_name, "flight.bin");
    }
}
