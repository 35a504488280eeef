use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::buffer::OrderedBuffer;
use crate::decimator::{
    BoundDecimator, DecimationInput, DecimationOutput, DecimatorOptions, InputKind,
};
use crate::error::{Error, Result};
use crate::registry::DecimatorRegistry;
use crate::scale::{AxisDescriptor, AxisScales, Scale};
use crate::value::{FlameChartValue, TraceValue, XYValue};

/// One decimation job as the host receives it.
///
/// `values` stays raw until the strategy is known, since its shape (one
/// buffer or one per series, samples or intervals) depends on the strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimationRequest {
    pub decimator_name: String,
    pub x_axis: AxisDescriptor,
    pub y_axis: AxisDescriptor,
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    pub x_domain: [f64; 2],
    pub y_domain: [f64; 2],
    /// Visible window start; the low end of `x_domain` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_end: Option<f64>,
    pub values: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    #[serde(flatten)]
    pub options: DecimatorOptions,
}

impl DecimationRequest {
    fn window(&self) -> (f64, f64) {
        let [a, b] = self.x_domain;
        (
            self.x_start.unwrap_or(a.min(b)),
            self.x_end.unwrap_or(a.max(b)),
        )
    }
}

/// What the host posts back: the strategy's native output, or why there is
/// none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimationResponse {
    pub decimator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DecimationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecimationResponse {
    pub fn new(decimator_name: impl Into<String>, result: Result<DecimationOutput>) -> Self {
        let decimator_name = decimator_name.into();
        match result {
            Ok(output) => DecimationResponse {
                decimator_name,
                result: Some(output),
                error: None,
            },
            Err(e) => DecimationResponse {
                decimator_name,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Runs one request to completion against a fresh bound decimator.
pub fn process(registry: &DecimatorRegistry, request: DecimationRequest) -> Result<DecimationOutput> {
    let strategy = registry.get(&request.decimator_name)?;
    let x = Scale::from_descriptor("x", &request.x_axis, request.x_domain, request.x_range)?;
    let y = Scale::from_descriptor("y", &request.y_axis, request.y_domain, request.y_range)?;
    let (x_start, x_end) = request.window();

    let kind = strategy.input_kind();
    let mut bound = BoundDecimator::initialize(
        strategy,
        Arc::new(AxisScales::new(x, y)),
        request.names,
    )
    .with_options(request.options);

    let output = match kind {
        InputKind::Xy => {
            let values: Vec<XYValue> = serde_json::from_value(request.values)?;
            bound.decimate_values(x_start, x_end, &DecimationInput::Xy(&values))?
        }
        InputKind::MultiXy => {
            let series: Vec<Vec<XYValue>> = serde_json::from_value(request.values)?;
            let buffers = series
                .iter()
                .map(|s| s as &dyn OrderedBuffer<XYValue>)
                .collect();
            bound.decimate_values(x_start, x_end, &DecimationInput::MultiXy(buffers))?
        }
        InputKind::Trace => {
            let values: Vec<TraceValue> = serde_json::from_value(request.values)?;
            bound.decimate_values(x_start, x_end, &DecimationInput::Trace(&values))?
        }
        InputKind::FlameChart => {
            let values: Vec<FlameChartValue> = serde_json::from_value(request.values)?;
            bound.decimate_values(x_start, x_end, &DecimationInput::FlameChart(&values))?
        }
    };
    Ok(output.clone())
}

type Job = (DecimationRequest, async_channel::Sender<Result<DecimationOutput>>);

/// Background execution context for decimation requests.
///
/// Requests are handled one at a time in arrival order; the bounded(1) queue
/// makes senders wait while a request is in flight. Each request runs on the
/// blocking pool, so a panicking strategy fails only its own request.
pub struct DecimationHost {
    registry: Arc<DecimatorRegistry>,
}

impl DecimationHost {
    pub fn new(registry: DecimatorRegistry) -> Self {
        DecimationHost {
            registry: Arc::new(registry),
        }
    }

    /// Starts the host on the current tokio runtime.
    pub fn spawn(self) -> HostHandle {
        let (job_send, job_recv) = async_channel::bounded::<Job>(1);
        tokio::spawn(serve(self.registry, job_recv));
        HostHandle { job_send }
    }
}

impl Default for DecimationHost {
    fn default() -> Self {
        Self::new(DecimatorRegistry::with_builtins())
    }
}

async fn serve(registry: Arc<DecimatorRegistry>, job_recv: async_channel::Receiver<Job>) {
    while let Ok((request, reply)) = job_recv.recv().await {
        let key = request.decimator_name.clone();
        log::debug!("decimating with {}", key);
        let shared = registry.clone();
        let result = match tokio::task::spawn_blocking(move || process(&shared, request)).await {
            Ok(result) => result,
            Err(e) => Err(Error::Aborted(e.to_string())),
        };
        match &result {
            Ok(output) => log::debug!("{}: {} values", key, output.len()),
            Err(e) => log::debug!("{}: {}", key, e),
        }
        let _ = reply.send(result).await;
    }
    log::debug!("decimation host stopped");
}

/// Cheap to clone; every clone feeds the same host.
#[derive(Debug, Clone)]
pub struct HostHandle {
    job_send: async_channel::Sender<Job>,
}

impl HostHandle {
    pub async fn decimate(&self, request: DecimationRequest) -> Result<DecimationOutput> {
        let (reply_send, reply_recv) = async_channel::bounded(1);
        self.job_send
            .send((request, reply_send))
            .await
            .map_err(|_| Error::HostClosed)?;
        reply_recv.recv().await.map_err(|_| Error::HostClosed)?
    }

    /// Stops accepting requests. The host exits once the queue drains.
    pub fn close(&self) -> bool {
        self.job_send.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimator::testutil::assert_close;
    use serde_json::json;

    fn request(decimator: &str, values: serde_json::Value) -> DecimationRequest {
        serde_json::from_value(json!({
            "decimatorName": decimator,
            "xAxis": { "kind": "Linear" },
            "yAxis": { "kind": "Linear" },
            "xRange": [0.0, 4.0],
            "yRange": [0.0, 100.0],
            "xDomain": [0.0, 4.0],
            "yDomain": [0.0, 10.0],
            "values": values,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn decimates_xy_request() {
        let handle = DecimationHost::default().spawn();
        let values = json!([
            { "x": 0.0, "y": 5.0 },
            { "x": 0.5, "y": 1.0 },
            { "x": 1.0, "y": 9.0 },
            { "x": 3.0, "y": 2.0 }
        ]);
        let out = handle.decimate(request("min-point", values)).await.unwrap();
        assert_eq!(
            out.as_xy().unwrap(),
            &[XYValue::new(0.5, 1.0), XYValue::new(1.0, 9.0), XYValue::new(3.0, 2.0)]
        );
    }

    #[tokio::test]
    async fn decimates_multi_series_request() {
        let handle = DecimationHost::default().spawn();
        let values = json!([
            [{ "x": 0.0, "y": 0.0 }, { "x": 2.0, "y": 4.0 }],
            [{ "x": 0.0, "y": 0.0 }, { "x": 2.0, "y": 2.0 }]
        ]);
        let mut req = request("summed-value-multi-xy-series", values);
        req.x_end = Some(2.0);
        let out = handle.decimate(req).await.unwrap();
        let rows = out.as_multi_xy().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_close(rows[0][0].y.as_scalar().unwrap(), 2.0);
        assert_close(rows[1][1].y.as_scalar().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn options_travel_with_the_request() {
        let handle = DecimationHost::default().spawn();
        let values = json!([
            { "traceValue": { "x": 0.0, "dx": 1.0, "name": "a" }, "depth": 0 },
            { "traceValue": { "x": 1.0, "dx": 2.0, "name": "b" }, "depth": 0 },
            { "traceValue": { "x": 3.0, "dx": 0.5, "name": "c" }, "depth": 1 }
        ]);
        let mut req = request("flame-chart-rect-limit", values);
        req.options.rect_limit = Some(1);
        let out = handle.decimate(req).await.unwrap();
        let rects = out.as_flame_chart().unwrap();
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].trace_value.name, "b");
    }

    #[test]
    fn request_reads_flattened_options() {
        let req: DecimationRequest = serde_json::from_value(json!({
            "decimatorName": "flame-chart-merge-rect",
            "xAxis": { "kind": "Linear" },
            "yAxis": { "kind": "Linear" },
            "xRange": [0.0, 4.0],
            "yRange": [0.0, 4.0],
            "xDomain": [0.0, 4.0],
            "yDomain": [0.0, 4.0],
            "xStart": 1.0,
            "values": [],
            "pixelWidth": 3.0,
            "strict": true
        }))
        .unwrap();
        assert_eq!(req.options.pixel_width, 3.0);
        assert!(req.options.strict);
        assert_eq!(req.options.rect_limit, None);
        assert_eq!(req.window(), (1.0, 4.0));
    }

    #[tokio::test]
    async fn unknown_decimator_is_reported() {
        let handle = DecimationHost::default().spawn();
        let err = handle
            .decimate(request("no-such-thing", json!([])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDecimator(_)));
    }

    #[tokio::test]
    async fn unsupported_scale_fails_before_decimation() {
        let handle = DecimationHost::default().spawn();
        let mut req = request("min-point", json!([]));
        req.x_axis.kind = "Band".to_string();
        let err = handle.decimate(req).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedScaleKind(kind) if kind == "Band"));
    }

    #[tokio::test]
    async fn misshapen_values_are_a_decode_error() {
        let handle = DecimationHost::default().spawn();
        let req = request("trace-state", json!([{ "x": 0.0, "y": 1.0 }]));
        let err = handle.decimate(req).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn host_keeps_serving_after_an_error() {
        let handle = DecimationHost::default().spawn();
        assert!(handle.decimate(request("nope", json!([]))).await.is_err());
        let out = handle.decimate(request("max-point", json!([]))).await.unwrap();
        assert!(out.is_empty());
    }

    struct Explodes;

    impl crate::decimator::Decimator for Explodes {
        fn key(&self) -> &'static str {
            "explodes"
        }

        fn name(&self) -> &'static str {
            "Explodes"
        }

        fn input_kind(&self) -> InputKind {
            InputKind::Xy
        }

        fn decimate(
            &self,
            _ctx: &crate::decimator::Context<'_>,
            _x_start: f64,
            _x_end: f64,
            _input: &DecimationInput<'_>,
        ) -> Result<DecimationOutput> {
            panic!("strategy bug")
        }
    }

    #[tokio::test]
    async fn panicking_strategy_fails_only_its_request() {
        let mut registry = DecimatorRegistry::with_builtins();
        registry.register(Arc::new(Explodes)).unwrap();
        let handle = DecimationHost::new(registry).spawn();

        let err = handle
            .decimate(request("explodes", json!([])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Aborted(_)));

        let values = json!([{ "x": 1.0, "y": 3.0 }]);
        let out = handle.decimate(request("min-point", values)).await.unwrap();
        assert_eq!(out.as_xy().unwrap(), &[XYValue::new(1.0, 3.0)]);
    }

    #[tokio::test]
    async fn unclamped_far_window_stays_within_pixels() {
        let handle = DecimationHost::default().spawn();
        let values = json!([{ "x": 0.0, "y": 0.0 }, { "x": 2.0, "y": 4.0 }]);
        let mut req = request("summed-value-xy-series", values);
        req.x_axis.clamp = false;
        req.x_end = Some(1e30);
        let out = handle.decimate(req).await.unwrap();
        assert_eq!(out.as_xy().unwrap().len(), 4);

        let out = handle.decimate(request("min-point", json!([]))).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn closed_host_rejects_requests() {
        let handle = DecimationHost::default().spawn();
        assert!(handle.close());
        let err = handle
            .decimate(request("min-point", json!([])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HostClosed));
    }

    #[test]
    fn response_carries_result_or_error() {
        let ok = DecimationResponse::new("min-point", Ok(DecimationOutput::Xy(vec![XYValue::new(1.0, 2.0)])));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "decimatorName": "min-point", "result": [{ "x": 1.0, "y": 2.0 }] })
        );

        let err = DecimationResponse::new("nope", Err(Error::UnknownDecimator("nope".into())));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "decimatorName": "nope",
                "error": "no decimator registered under key \"nope\""
            })
        );
    }
}
