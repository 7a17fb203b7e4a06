//! Composition layer: higher-level drawing operations built purely out of
//! primitive proxy calls.
//!
//! A [`Surface`] wraps a proxy together with the handles of a canvas object
//! and a drawing region on it. Operation names (`figure`, `add_subplot`,
//! `plot`, …) are opaque strings passed through to the backend; the layer
//! only does keyword plumbing (legend labels, line widths, fill alpha) the
//! way a plotting front end would.

use serde_json::Value;

use crate::error::ProxyError;
use crate::protocol::{Args, HandleName, ResultPolicy, ReturnPolicy, ReturnValue};
use crate::proxy::CallProxy;

/// Line width applied when the caller specifies none.
const DEFAULT_LINE_WIDTH: f64 = 3.0;

/// Histogram bar alpha applied when the caller specifies none.
const DEFAULT_HIST_ALPHA: f64 = 0.3;

/// Presentation options shared by the drawing helpers.
#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    /// Legend label; labeled series refresh the region's legend.
    pub legend: Option<String>,
    /// Line width; defaults to 3.
    pub line_width: Option<f64>,
    /// Series color, forwarded opaquely.
    pub color: Option<Value>,
    /// Series alpha.
    pub alpha: Option<f64>,
}

/// A drawing surface: a canvas object plus one region on it.
pub struct Surface {
    proxy: CallProxy,
    canvas: HandleName,
    region: Option<HandleName>,
    series: u64,
}

impl Surface {
    /// Creates a canvas on the backend and wraps it.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures from the canvas-creating call.
    pub fn new(proxy: CallProxy) -> Result<Self, ProxyError> {
        let reply = proxy.call_primitive("figure", Args::none(), ResultPolicy::store())?;
        let canvas = expect_handle(reply, "figure")?;
        Ok(Self {
            proxy,
            canvas,
            region: None,
            series: 0,
        })
    }

    /// Handle of the underlying canvas object.
    #[must_use]
    pub fn canvas(&self) -> &HandleName {
        &self.canvas
    }

    /// The proxy this surface issues its calls through.
    #[must_use]
    pub fn proxy(&self) -> &CallProxy {
        &self.proxy
    }

    /// Number of series drawn on this surface so far.
    #[must_use]
    pub fn series_count(&self) -> u64 {
        self.series
    }

    /// Sets a named style via the backend's stateless namespace.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures.
    pub fn set_style(&self, style: &str) -> Result<(), ProxyError> {
        self.proxy.call_namespaced(
            "set_style",
            Args::positional([Value::from(style)]),
            ReturnPolicy::Discard,
        )?;
        Ok(())
    }

    /// Splits off a sub-region of the canvas as its own surface.
    ///
    /// The child shares this surface's channel set through a subordinate
    /// proxy, so drawing through parent and child is executed by the same
    /// worker in per-category order.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures from the region-creating call.
    pub fn subregion(&self, rows: u32, cols: u32, row: u32, col: u32) -> Result<Self, ProxyError> {
        let reply = self.proxy.call_method(
            self.canvas.clone(),
            "add_subplot",
            Args::positional([rows, cols, row, col]),
            ResultPolicy::store(),
        )?;
        let region = expect_handle(reply, "add_subplot")?;
        Ok(Self {
            proxy: self.proxy.subordinate(),
            canvas: self.canvas.clone(),
            region: Some(region),
            series: 0,
        })
    }

    /// Draws one series by invoking `method` on the region with keyword
    /// defaulting, refreshing the legend for labeled series.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures.
    pub fn draw(&mut self, method: &str, mut args: Args, opts: &DrawOptions) -> Result<(), ProxyError> {
        if let Some(legend) = &opts.legend {
            args.default_keyword("label", legend.as_str());
        }
        args.default_keyword("lw", opts.line_width.unwrap_or(DEFAULT_LINE_WIDTH));
        if let Some(color) = &opts.color {
            args.default_keyword("color", color.clone());
        }
        if let Some(alpha) = opts.alpha {
            args.default_keyword("alpha", alpha);
        }

        let labeled = args.keyword("label").is_some();
        let region = self.region()?;
        self.proxy
            .call_method(region.clone(), method, args, ResultPolicy::Discard)?;
        if labeled {
            self.proxy
                .call_method(region, "legend", Args::none(), ResultPolicy::Discard)?;
        }
        self.series += 1;
        Ok(())
    }

    /// Plots `ys` over `xs` as a line series.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures.
    pub fn plot(&mut self, xs: &[f64], ys: &[f64], opts: &DrawOptions) -> Result<(), ProxyError> {
        self.draw("plot", series_args(xs, ys), opts)
    }

    /// Plots a line series and fills under it at `fill_alpha`.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures.
    pub fn plot_fill(
        &mut self,
        xs: &[f64],
        ys: &[f64],
        opts: &DrawOptions,
        fill_alpha: f64,
    ) -> Result<(), ProxyError> {
        self.plot(xs, ys, opts)?;

        let mut args = series_args(xs, ys).with_keyword("alpha", fill_alpha);
        if let Some(color) = &opts.color {
            args.default_keyword("color", color.clone());
        }
        let region = self.region()?;
        self.proxy
            .call_method(region, "fill_between", args, ResultPolicy::Discard)?;
        Ok(())
    }

    /// Draws a histogram of `samples`. The edge color falls back to the
    /// series color when not given.
    ///
    /// # Errors
    ///
    /// Propagates proxy failures.
    pub fn histogram(
        &mut self,
        samples: &[f64],
        opts: &DrawOptions,
        edge_color: Option<Value>,
    ) -> Result<(), ProxyError> {
        let mut args = Args::positional([Value::from(samples.to_vec())]);
        args.default_keyword("alpha", opts.alpha.unwrap_or(DEFAULT_HIST_ALPHA));
        if let Some(edge) = edge_color.or_else(|| opts.color.clone()) {
            args.default_keyword("edgecolor", edge);
        }
        self.draw("hist", args, opts)
    }

    /// Lazily materializes the drawing region on the canvas.
    fn region(&mut self) -> Result<HandleName, ProxyError> {
        if let Some(region) = &self.region {
            return Ok(region.clone());
        }
        let reply = self.proxy.call_method(
            self.canvas.clone(),
            "add_subplot",
            Args::positional([1, 1, 0, 0]),
            ResultPolicy::store(),
        )?;
        let region = expect_handle(reply, "add_subplot")?;
        self.region = Some(region.clone());
        Ok(region)
    }
}

fn series_args(xs: &[f64], ys: &[f64]) -> Args {
    Args::positional([Value::from(xs.to_vec()), Value::from(ys.to_vec())])
}

fn expect_handle(reply: Option<ReturnValue>, operation: &str) -> Result<HandleName, ProxyError> {
    match reply {
        Some(ReturnValue::Stored { handle }) => Ok(handle),
        other => Err(ProxyError::UnexpectedReply(format!(
            "{operation}: expected a stored handle, got {other:?}"
        ))),
    }
}
