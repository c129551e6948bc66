//! Progress reported by `ffmpeg -progress pipe:2`.

/// Latest progress block of a running ffmpeg process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Media time written so far, in milliseconds
    pub out_time_ms: i64,
    /// Multiple of realtime; zero until ffmpeg reports one
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Media seconds written so far.
    pub fn out_secs(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }

    /// Share of `total_secs` processed, within `[0, 1]`.
    pub fn fraction_of(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_secs <= 0.0 {
            return 0.0;
        }
        (self.out_secs() / total_secs).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_of_clip() {
        let mut progress = FfmpegProgress {
            out_time_ms: 2_500,
            ..Default::default()
        };

        assert!((progress.fraction_of(10.0) - 0.25).abs() < 1e-9);
        assert_eq!(progress.fraction_of(1.0), 1.0);
        assert_eq!(progress.fraction_of(0.0), 0.0);

        progress.is_complete = true;
        assert_eq!(progress.fraction_of(100.0), 1.0);
    }
}
