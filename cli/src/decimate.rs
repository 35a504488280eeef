use clap::Args;
use decima::{DecimationHost, DecimationRequest, DecimationResponse};
use eyre::{Result, WrapErr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use crate::io::{open_input, open_output};

#[derive(Args, Debug)]
pub struct Opts {
    /// Output file
    #[clap(long, default_value = "stdout")]
    output: String,

    /// Fail on buckets with no contributing samples instead of marking them
    #[clap(long, env = "DECIMA_STRICT")]
    strict: bool,

    /// Pixel tolerance for flame chart grouping, overriding each request
    #[clap(long)]
    pixel_width: Option<f64>,

    /// Input file of JSON-lines requests
    #[clap(default_value = "stdin")]
    input: String,
}

impl Opts {
    fn apply(&self, request: &mut DecimationRequest) {
        if self.strict {
            request.options.strict = true;
        }
        if let Some(pixel_width) = self.pixel_width {
            request.options.pixel_width = pixel_width;
        }
    }
}

/// Streams requests through a decimation host, one response line per
/// request line. A failing request is reported in its response and does not
/// stop the stream; a line that is not a request does.
pub async fn decimate(opts: &Opts) -> Result<()> {
    let input = open_input(&opts.input).await?;
    let mut output = open_output(&opts.output).await?;
    let host = DecimationHost::default().spawn();

    let mut lines = input.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut request: DecimationRequest = serde_json::from_str(&line)
            .wrap_err_with(|| format!("{}:{}: malformed request", opts.input, line_no))?;
        opts.apply(&mut request);

        let name = request.decimator_name.clone();
        let result = host.decimate(request).await;
        if let Err(e) = &result {
            log::warn!("{}:{}: {}", opts.input, line_no, e);
        }

        let mut buf = serde_json::to_vec(&DecimationResponse::new(name, result))?;
        buf.push(b'\n');
        output.write_all(&buf).await?;
    }

    output.flush().await?;
    host.close();
    log::debug!("decimated {} requests", line_no);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> DecimationRequest {
        serde_json::from_value(json!({
            "decimatorName": "flame-chart-merge-rect",
            "xAxis": { "kind": "Linear" },
            "yAxis": { "kind": "Linear" },
            "xRange": [0.0, 100.0],
            "yRange": [0.0, 10.0],
            "xDomain": [0.0, 1.0],
            "yDomain": [0.0, 1.0],
            "values": [],
            "pixelWidth": 2.0
        }))
        .unwrap()
    }

    #[test]
    fn overrides_replace_request_options() {
        let opts = Opts {
            output: "stdout".into(),
            strict: true,
            pixel_width: Some(0.5),
            input: "stdin".into(),
        };
        let mut req = request();
        opts.apply(&mut req);
        assert!(req.options.strict);
        assert_eq!(req.options.pixel_width, 0.5);
    }

    #[test]
    fn no_overrides_keep_request_options() {
        let opts = Opts {
            output: "stdout".into(),
            strict: false,
            pixel_width: None,
            input: "stdin".into(),
        };
        let mut req = request();
        opts.apply(&mut req);
        assert!(!req.options.strict);
        assert_eq!(req.options.pixel_width, 2.0);
    }
}
