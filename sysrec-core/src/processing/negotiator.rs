use crate::models::audio_models::{DeliveredBatch, FormatDescriptor, NegotiatedFormat};
use crate::models::error::CaptureError;
use crate::processing::wav_format;

/// Derive the session's output format from the first delivered batch.
///
/// Only sample rate and channel count are taken from the descriptor; the
/// stored representation is always 32-bit float planar.
pub fn negotiate(batch: &DeliveredBatch<'_>) -> Result<NegotiatedFormat, CaptureError> {
    let descriptor = batch
        .descriptor
        .ok_or_else(|| CaptureError::FormatUnavailable("batch carries no format description".into()))?;

    let header_rate = wav_format::header_sample_rate(descriptor.sample_rate).ok_or_else(|| {
        CaptureError::FormatUnavailable(format!("invalid sample rate {}", descriptor.sample_rate))
    })?;

    let channels = u16::try_from(descriptor.channels_per_frame)
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| {
            CaptureError::FormatUnavailable(format!(
                "invalid channel count {}",
                descriptor.channels_per_frame
            ))
        })?;

    if wav_format::frame_geometry(header_rate, channels).is_none() {
        return Err(CaptureError::FormatUnavailable(format!(
            "{} Hz with {} channels overflows the WAV header",
            descriptor.sample_rate, channels
        )));
    }

    Ok(NegotiatedFormat::float32_planar(descriptor.sample_rate, channels))
}

/// Reject a later batch whose descriptor disagrees with the negotiated format.
///
/// Batches without a descriptor are accepted as-is.
pub fn check_consistent(format: &NegotiatedFormat, descriptor: Option<&FormatDescriptor>) -> Result<(), CaptureError> {
    let Some(descriptor) = descriptor else {
        return Ok(());
    };

    if descriptor.sample_rate != format.sample_rate || descriptor.channels_per_frame != u32::from(format.channels) {
        return Err(CaptureError::Conversion(format!(
            "format changed mid-session: negotiated {} Hz/{} ch, batch has {} Hz/{} ch",
            format.sample_rate, format.channels, descriptor.sample_rate, descriptor.channels_per_frame
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::SampleRepresentation;

    fn batch(descriptor: Option<FormatDescriptor>) -> DeliveredBatch<'static> {
        DeliveredBatch {
            presentation_time_secs: 0.0,
            frame_count: 0,
            buffers: Vec::new(),
            descriptor,
        }
    }

    #[test]
    fn negotiates_rate_and_channels() {
        let format = negotiate(&batch(Some(FormatDescriptor::float32_planar(48000.0, 2)))).unwrap();
        assert_eq!(format.sample_rate, 48000.0);
        assert_eq!(format.channels, 2);
        assert_eq!(format.representation, SampleRepresentation::Float32Planar);
    }

    #[test]
    fn interleaved_source_still_negotiates_planar() {
        let format = negotiate(&batch(Some(FormatDescriptor::float32_interleaved(44100.0, 1)))).unwrap();
        assert_eq!(format, NegotiatedFormat::float32_planar(44100.0, 1));
    }

    #[test]
    fn missing_descriptor_is_unavailable() {
        assert!(matches!(negotiate(&batch(None)), Err(CaptureError::FormatUnavailable(_))));
    }

    #[test]
    fn zero_channels_is_unavailable() {
        let result = negotiate(&batch(Some(FormatDescriptor::float32_planar(48000.0, 0))));
        assert!(matches!(result, Err(CaptureError::FormatUnavailable(_))));
    }

    #[test]
    fn bad_rate_is_unavailable() {
        for rate in [0.0, 0.4, -1.0, f64::NAN, f64::INFINITY, 5.0e9] {
            let result = negotiate(&batch(Some(FormatDescriptor::float32_planar(rate, 2))));
            assert!(matches!(result, Err(CaptureError::FormatUnavailable(_))), "rate {rate}");
        }
    }

    #[test]
    fn header_overflow_is_unavailable() {
        for descriptor in [
            FormatDescriptor::float32_interleaved(2.0e9, 2),
            FormatDescriptor::float32_interleaved(48000.0, 16384),
            FormatDescriptor::float32_planar(48000.0, 70000),
        ] {
            let result = negotiate(&batch(Some(descriptor)));
            assert!(matches!(result, Err(CaptureError::FormatUnavailable(_))), "{descriptor:?}");
        }
    }

    #[test]
    fn largest_header_safe_channel_count_negotiates() {
        let format = negotiate(&batch(Some(FormatDescriptor::float32_planar(48000.0, 16383)))).unwrap();
        assert_eq!(format.channels, 16383);
    }

    #[test]
    fn consistency_check() {
        let format = NegotiatedFormat::float32_planar(48000.0, 2);
        assert!(check_consistent(&format, None).is_ok());
        assert!(check_consistent(&format, Some(&FormatDescriptor::float32_planar(48000.0, 2))).is_ok());
        assert!(matches!(
            check_consistent(&format, Some(&FormatDescriptor::float32_planar(44100.0, 2))),
            Err(CaptureError::Conversion(_))
        ));
        assert!(matches!(
            check_consistent(&format, Some(&FormatDescriptor::float32_planar(48000.0, 1))),
            Err(CaptureError::Conversion(_))
        ));
    }
}
