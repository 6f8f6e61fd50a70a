//! Playback Context - State & Volume

use serde::Serialize;

/// 音量下限
pub const MIN_VOLUME: f32 = 0.0;
/// 音量上限
pub const MAX_VOLUME: f32 = 2.0;
/// 感知音量曲线的指数（log2(3.16)）
const PERCEPTUAL_EXPONENT: f32 = 1.660964;

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// 没有当前曲目
    Idle,
    /// 当前曲目正在输出
    Playing,
    /// 当前曲目已绑定但暂停
    Paused,
    /// 队列播完并已离开，终态
    Finished,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Finished => "finished",
        }
    }

    /// 由会话字段推导状态
    pub fn derive(finished: bool, bound: bool, is_playing: bool) -> Self {
        match (finished, bound, is_playing) {
            (true, _, _) => PlaybackState::Finished,
            (false, true, true) => PlaybackState::Playing,
            (false, true, false) => PlaybackState::Paused,
            (false, false, _) => PlaybackState::Idle,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 音量，始终位于 [0.0, 2.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    /// 超出范围时取最近的边界；NaN 返回 None
    pub fn new(value: f32) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        Some(Self(value.clamp(MIN_VOLUME, MAX_VOLUME)))
    }

    pub fn as_f32(&self) -> f32 {
        self.0
    }

    /// 传输层使用的增益（对数映射，非线性）
    pub fn gain(&self) -> f32 {
        self.0.powf(PERCEPTUAL_EXPONENT)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamps_to_bounds() {
        assert_eq!(Volume::new(3.5).unwrap().as_f32(), 2.0);
        assert_eq!(Volume::new(-1.0).unwrap().as_f32(), 0.0);
        assert_eq!(Volume::new(f32::INFINITY).unwrap().as_f32(), 2.0);
        assert_eq!(Volume::new(0.4).unwrap().as_f32(), 0.4);
        assert!(Volume::new(f32::NAN).is_none());
    }

    #[test]
    fn test_gain_is_perceptual() {
        assert_eq!(Volume::new(1.0).unwrap().gain(), 1.0);
        assert_eq!(Volume::new(0.0).unwrap().gain(), 0.0);

        let half = Volume::new(0.5).unwrap().gain();
        assert!(half < 0.5);
        assert!((half - 0.316).abs() < 0.01);

        let double = Volume::new(2.0).unwrap().gain();
        assert!((double - 3.16).abs() < 0.01);
    }

    #[test]
    fn test_state_derivation() {
        assert_eq!(PlaybackState::derive(false, false, false), PlaybackState::Idle);
        assert_eq!(PlaybackState::derive(false, true, true), PlaybackState::Playing);
        assert_eq!(PlaybackState::derive(false, true, false), PlaybackState::Paused);
        assert_eq!(PlaybackState::derive(true, false, false), PlaybackState::Finished);
        assert_eq!(PlaybackState::Paused.as_str(), "paused");
    }
}
