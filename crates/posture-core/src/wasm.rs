//! WebAssembly 绑定
//!
//! 浏览器端直接把姿态模型输出的关键点交给 `PostureMonitor`，
//! 关键点以扁平 `Float64Array` 传入（每点 x, y, z, visibility）。

use js_sys::Float64Array;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::angle::ViewingDirection;
use crate::calibration::CalibrationProfile;
use crate::config::AnalysisConfig;
use crate::diagnosis::Diagnosis;
use crate::error::AnalysisError;
use crate::landmark::Landmark;
use crate::session::AnalysisSession;
use crate::summary::SessionSummary;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeasurementReport {
    summary: SessionSummary,
    diagnosis: Diagnosis,
}

fn to_js_error(err: AnalysisError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn timestamp_ms(timestamp: f64) -> u64 {
    if timestamp.is_finite() && timestamp > 0.0 {
        timestamp as u64
    } else {
        0
    }
}

fn direction(from_left: bool) -> ViewingDirection {
    if from_left {
        ViewingDirection::Left
    } else {
        ViewingDirection::Right
    }
}

/// 浏览器端姿态监测器
#[wasm_bindgen]
pub struct PostureMonitor {
    session: AnalysisSession,
}

#[wasm_bindgen]
impl PostureMonitor {
    /// `config` 可为 undefined，缺省字段使用默认值
    #[wasm_bindgen(constructor)]
    pub fn new(mean: f64, std_dev: f64, view_from_left: bool, config: JsValue) -> Result<PostureMonitor, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            AnalysisConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        Ok(Self {
            session: AnalysisSession::new(
                config,
                CalibrationProfile::new(mean, std_dev),
                direction(view_from_left),
            ),
        })
    }

    #[wasm_bindgen(js_name = "processFrame")]
    pub fn process_frame(&mut self, landmarks: &Float64Array, timestamp: f64) -> Result<JsValue, JsValue> {
        let landmarks = Landmark::from_flat(&landmarks.to_vec());
        let analysis = self.session.process_frame(&landmarks, timestamp_ms(timestamp));
        to_js(&analysis)
    }

    /// 无帧时推进校准倒计时，返回本次结束的校准结果或 null
    pub fn tick(&mut self, timestamp: f64) -> Result<JsValue, JsValue> {
        match self.session.tick(timestamp_ms(timestamp)) {
            Some(outcome) => to_js(&outcome),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = "startCalibration")]
    pub fn start_calibration(&mut self, timestamp: f64) -> Result<(), JsValue> {
        self.session.start_calibration(timestamp_ms(timestamp)).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "cancelCalibration")]
    pub fn cancel_calibration(&mut self) -> Result<(), JsValue> {
        self.session.cancel_calibration().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "startMeasurement")]
    pub fn start_measurement(&mut self, timestamp: f64) -> Result<(), JsValue> {
        self.session.start_measurement(timestamp_ms(timestamp)).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "stopMeasurement")]
    pub fn stop_measurement(&mut self, timestamp: f64) -> Result<JsValue, JsValue> {
        let summary = self
            .session
            .stop_measurement(timestamp_ms(timestamp))
            .map_err(to_js_error)?;
        let diagnosis = self.session.diagnose(&summary);
        to_js(&MeasurementReport { summary, diagnosis })
    }

    #[wasm_bindgen(js_name = "discardMeasurement")]
    pub fn discard_measurement(&mut self) -> Result<(), JsValue> {
        self.session.discard_measurement().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "setViewingDirection")]
    pub fn set_viewing_direction(&mut self, view_from_left: bool) -> Result<(), JsValue> {
        self.session
            .set_viewing_direction(direction(view_from_left))
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "applyProfile")]
    pub fn apply_profile(&mut self, mean: f64, std_dev: f64) -> Result<(), JsValue> {
        self.session
            .apply_profile(CalibrationProfile::new(mean, std_dev))
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "getProfile")]
    pub fn get_profile(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.profile())
    }

    #[wasm_bindgen(js_name = "getThresholds")]
    pub fn get_thresholds(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.thresholds())
    }

    #[wasm_bindgen(js_name = "getState")]
    pub fn get_state(&self) -> String {
        self.session.state().as_str().to_string()
    }
}
