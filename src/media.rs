use crate::error::{MediaError, Result};
use crate::peer::types::TrackKind;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Opus-кадр тишины (TOC 0xF8, 20 мс)
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Допустимый диапазон для одного измерения кадра
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionRange {
    pub min: u32,
    pub ideal: u32,
    pub max: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: DimensionRange,
    pub height: DimensionRange,
}

/// Ограничения для захвата локального медиа
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: VideoConstraints {
                width: DimensionRange {
                    min: 640,
                    ideal: 1920,
                    max: 1920,
                },
                height: DimensionRange {
                    min: 480,
                    ideal: 1080,
                    max: 1080,
                },
            },
            audio: true,
        }
    }
}

impl MediaConstraints {
    pub fn validate(&self) -> std::result::Result<(), MediaError> {
        for (name, range) in [("width", self.video.width), ("height", self.video.height)] {
            if range.min == 0 || range.min > range.ideal || range.ideal > range.max {
                return Err(MediaError::Unsatisfiable(format!(
                    "{name} requires 0 < min <= ideal <= max, got {}/{}/{}",
                    range.min, range.ideal, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Локальный трек. Клоны разделяют флаг `enabled`, поэтому выключение
/// трека видно и транспорту, к которому он подключён.
#[derive(Clone)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    enabled: Arc<AtomicBool>,
    rtp: Option<Arc<TrackLocalStaticSample>>,
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: Arc::new(AtomicBool::new(true)),
            rtp: None,
        }
    }

    pub fn with_rtp(mut self, rtp: Arc<TrackLocalStaticSample>) -> Self {
        self.rtp = Some(rtp);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn rtp(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.rtp.as_ref()
    }

    /// Отправляет кадр в транспорт. Выключенный аудио-трек шлёт тишину,
    /// выключенный видео-трек кадры не отдаёт. Трек при этом остаётся
    /// в peer connection.
    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        let Some(rtp) = &self.rtp else {
            return Ok(());
        };
        if self.is_enabled() {
            rtp.write_sample(sample).await?;
            return Ok(());
        }
        match self.kind {
            TrackKind::Audio => {
                let silence = Sample {
                    data: Bytes::from_static(&OPUS_SILENCE),
                    duration: sample.duration,
                    ..Default::default()
                };
                rtp.write_sample(&silence).await?;
            }
            TrackKind::Video => {}
        }
        Ok(())
    }
}

/// Трек, полученный от удалённой стороны
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
    pub rtp: Option<Arc<TrackRemote>>,
}

impl std::fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: stream_id.into(),
            rtp: None,
        }
    }

    pub fn from_rtp(track: Arc<TrackRemote>) -> Self {
        let kind = match track.kind() {
            RTPCodecType::Audio => TrackKind::Audio,
            _ => TrackKind::Video,
        };
        Self {
            id: track.id(),
            kind,
            stream_id: track.stream_id(),
            rtp: Some(track),
        }
    }
}

/// Накопитель треков удалённой стороны
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<RemoteTrack>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет трек; повторное добавление того же id ничего не меняет
    pub fn add_track(&mut self, track: RemoteTrack) -> bool {
        if self.tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        &self.tracks
    }

    pub fn track_ids(&self) -> Vec<&str> {
        self.tracks.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

/// Источник локальных аудио/видео треков
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> std::result::Result<Vec<LocalTrack>, MediaError>;
}

/// Захват на основе sample-треков webrtc: кадры в треки пишет приложение
/// через [`LocalTrack::write_sample`].
pub struct SampleCapture {
    stream_id: String,
}

impl SampleCapture {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

#[async_trait]
impl MediaCapture for SampleCapture {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> std::result::Result<Vec<LocalTrack>, MediaError> {
        constraints.validate()?;

        let mut tracks = Vec::with_capacity(2);
        let video_id = format!("{}-video", self.stream_id);
        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
            video_id.clone(),
            self.stream_id.clone(),
        ));
        tracks.push(LocalTrack::new(video_id, TrackKind::Video).with_rtp(video));

        if constraints.audio {
            let audio_id = format!("{}-audio", self.stream_id);
            let audio = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                audio_id.clone(),
                self.stream_id.clone(),
            ));
            tracks.push(LocalTrack::new(audio_id, TrackKind::Audio).with_rtp(audio));
        }

        debug!(
            stream = %self.stream_id,
            width = constraints.video.width.ideal,
            height = constraints.video.height.ideal,
            tracks = tracks.len(),
            "local media acquired"
        );
        Ok(tracks)
    }
}
