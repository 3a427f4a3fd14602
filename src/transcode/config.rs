//! Transcoding job configuration
//!
//! A typed description of one transcoding run: the rendition ladder, segment
//! parameters and output paths. [`TranscodeSpec::to_args`] is the pure
//! mapping from configuration to the ffmpeg argument list, kept free of any
//! process handling so it can be tested on its own.

use std::path::PathBuf;

/// One bitrate/resolution variant of the adaptive output set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Variant name, used for playlist directories and the stream map
    pub name: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Video bitrate in kbit/s
    pub video_kbps: u32,
    /// Audio bitrate in kbit/s
    pub audio_kbps: u32,
}

impl Rendition {
    pub fn new(name: impl Into<String>, width: u32, height: u32, video_kbps: u32, audio_kbps: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            video_kbps,
            audio_kbps,
        }
    }

    /// The default four-tier ladder: 1080p, 720p, 480p, 240p
    pub fn default_ladder() -> Vec<Rendition> {
        vec![
            Rendition::new("1080p", 1920, 1080, 3500, 192),
            Rendition::new("720p", 1280, 720, 2000, 128),
            Rendition::new("480p", 854, 480, 1000, 96),
            Rendition::new("240p", 426, 240, 400, 64),
        ]
    }
}

/// Full description of one transcoding job
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    /// Live stream the transcoder pulls back from the local server
    pub input_url: String,
    /// Directory receiving the segmented output tree
    pub hls_dir: PathBuf,
    /// Path of the stream-copied recording file
    pub archive_path: PathBuf,
    /// Rendition ladder
    pub renditions: Vec<Rendition>,
    /// Segment duration in seconds
    pub segment_seconds: u32,
    /// Segments retained per rendition playlist
    pub segment_window: u32,
    /// Output frame rate
    pub frame_rate: u32,
    /// Keyframe interval in frames
    pub keyframe_interval: u32,
}

impl TranscodeSpec {
    /// Build the ffmpeg argument list for this job
    ///
    /// Output one is the adaptive segmented set (one variant per rendition,
    /// sliding-window playlists, a master playlist referencing all variants);
    /// output two is the stream-copied single-file archive.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            self.input_url.clone(),
            "-filter_complex".into(),
            self.filter_graph(),
        ];

        for (i, r) in self.renditions.iter().enumerate() {
            args.extend([
                "-map".into(),
                format!("[v{}]", r.name),
                "-map".into(),
                "0:a".into(),
                format!("-c:v:{i}"),
                "libx264".into(),
                format!("-b:v:{i}"),
                format!("{}k", r.video_kbps),
                format!("-maxrate:v:{i}"),
                format!("{}k", r.video_kbps),
                format!("-bufsize:v:{i}"),
                format!("{}k", r.video_kbps * 2),
                "-preset".into(),
                "ultrafast".into(),
                "-tune".into(),
                "zerolatency".into(),
                "-g".into(),
                self.keyframe_interval.to_string(),
                "-keyint_min".into(),
                self.keyframe_interval.to_string(),
                "-sc_threshold".into(),
                "0".into(),
                "-r".into(),
                self.frame_rate.to_string(),
                format!("-c:a:{i}"),
                "aac".into(),
                format!("-b:a:{i}"),
                format!("{}k", r.audio_kbps),
                "-ac".into(),
                "2".into(),
                "-ar".into(),
                "44100".into(),
            ]);
        }

        args.extend([
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_seconds.to_string(),
            "-hls_list_size".into(),
            self.segment_window.to_string(),
            "-hls_flags".into(),
            "delete_segments+append_list".into(),
            "-var_stream_map".into(),
            self.var_stream_map(),
            "-master_pl_name".into(),
            "master.m3u8".into(),
            "-hls_segment_filename".into(),
            self.hls_dir.join("%v/seg_%03d.ts").to_string_lossy().into_owned(),
            self.hls_dir.join("%v/index.m3u8").to_string_lossy().into_owned(),
        ]);

        // Second output: lossless single-file archive
        args.extend([
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "0:a".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "copy".into(),
            self.archive_path.to_string_lossy().into_owned(),
        ]);

        args
    }

    /// Split/scale filter graph feeding one scaled stream per rendition
    fn filter_graph(&self) -> String {
        let n = self.renditions.len();
        let mut graph = format!("[0:v]split={n}");
        for i in 0..n {
            graph.push_str(&format!("[s{i}]"));
        }
        for (i, r) in self.renditions.iter().enumerate() {
            graph.push_str(&format!(
                ";[s{i}]scale=w={}:h={}[v{}]",
                r.width, r.height, r.name
            ));
        }
        graph
    }

    /// Variant-to-name mapping for the master playlist
    fn var_stream_map(&self) -> String {
        self.renditions
            .iter()
            .enumerate()
            .map(|(i, r)| format!("v:{i},a:{i},name:{}", r.name))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TranscodeSpec {
        TranscodeSpec {
            input_url: "rtmp://127.0.0.1:1935/live/abc123".into(),
            hls_dir: PathBuf::from("/tmp/hls/abc123"),
            archive_path: PathBuf::from("/tmp/archive/archive_abc123_1700000000.mp4"),
            renditions: Rendition::default_ladder(),
            segment_seconds: 2,
            segment_window: 6,
            frame_rate: 30,
            keyframe_interval: 60,
        }
    }

    #[test]
    fn test_default_ladder() {
        let ladder = Rendition::default_ladder();
        assert_eq!(ladder.len(), 4);
        assert_eq!(ladder[0].name, "1080p");
        assert_eq!(ladder[0].video_kbps, 3500);
        assert_eq!(ladder[3].name, "240p");
        assert_eq!(ladder[3].audio_kbps, 64);
    }

    #[test]
    fn test_filter_graph() {
        let graph = spec().filter_graph();
        assert!(graph.starts_with("[0:v]split=4[s0][s1][s2][s3]"));
        assert!(graph.contains(";[s0]scale=w=1920:h=1080[v1080p]"));
        assert!(graph.contains(";[s3]scale=w=426:h=240[v240p]"));
    }

    #[test]
    fn test_var_stream_map() {
        assert_eq!(
            spec().var_stream_map(),
            "v:0,a:0,name:1080p v:1,a:1,name:720p v:2,a:2,name:480p v:3,a:3,name:240p"
        );
    }

    #[test]
    fn test_args_input_and_renditions() {
        let args = spec().to_args();

        assert_eq!(args[0], "-y");
        assert_eq!(args[1], "-i");
        assert_eq!(args[2], "rtmp://127.0.0.1:1935/live/abc123");

        // Per-rendition codec settings are indexed by output stream
        let joined = args.join(" ");
        assert!(joined.contains("-map [v1080p] -map 0:a -c:v:0 libx264 -b:v:0 3500k"));
        assert!(joined.contains("-bufsize:v:0 7000k"));
        assert!(joined.contains("-c:a:2 aac -b:a:2 96k"));
        assert!(joined.contains("-map [v240p] -map 0:a -c:v:3 libx264 -b:v:3 400k"));
    }

    #[test]
    fn test_args_hls_output() {
        let joined = spec().to_args().join(" ");
        assert!(joined.contains("-f hls -hls_time 2 -hls_list_size 6"));
        assert!(joined.contains("-hls_flags delete_segments+append_list"));
        assert!(joined.contains("-master_pl_name master.m3u8"));
        assert!(joined.contains("-hls_segment_filename /tmp/hls/abc123/%v/seg_%03d.ts"));
        assert!(joined.contains("/tmp/hls/abc123/%v/index.m3u8"));
    }

    #[test]
    fn test_args_archive_output_is_last() {
        let args = spec().to_args();
        let last = args.last().unwrap();
        assert_eq!(last, "/tmp/archive/archive_abc123_1700000000.mp4");

        // The archive output is a stream copy, never a re-encode
        let joined = args.join(" ");
        assert!(joined.ends_with("-map 0:v -map 0:a -c:v copy -c:a copy /tmp/archive/archive_abc123_1700000000.mp4"));
    }
}
