use super::MetricsSink;
use crate::config::StatsdConfig;
use crate::errors::InterceptorError;
use crate::metrics::SharedTelemetry;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt::{Display, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, info};

/// How tags are attached to a StatsD line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFormat {
    /// `name:1|c|#route:/users,method:get`
    #[default]
    Datadog,
    /// `name,route=/users,method=get:1|c`
    Telegraf,
}

/// Non-blocking UDP StatsD client. One datagram per metric, no retries.
pub struct StatsdClient {
    socket: UdpSocket,
    target: SocketAddr,
    prefix: String,
    suffix: String,
    global_tags: Vec<String>,
    tag_format: TagFormat,
    telemetry: Option<SharedTelemetry>,
}

impl StatsdClient {
    pub fn new(config: &StatsdConfig) -> Result<Self, InterceptorError> {
        let address = format!("{}:{}", config.host, config.port);
        let target = address
            .to_socket_addrs()
            .map_err(|_| InterceptorError::InvalidAddress(address.clone()))?
            .next()
            .ok_or(InterceptorError::InvalidAddress(address))?;

        let bind: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&bind.into())?;

        info!(
            target = %target,
            prefix = %config.prefix,
            tag_format = ?config.tag_format,
            "StatsD client ready"
        );

        Ok(Self {
            socket: socket.into(),
            target,
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
            global_tags: config.global_tags.iter().map(|t| sanitize_tag(t)).collect(),
            tag_format: config.tag_format,
            telemetry: None,
        })
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Render one StatsD line.
    pub fn format_line(
        &self,
        name: &str,
        value: impl Display,
        metric_type: &str,
        sample_rate: f64,
        tags: &[String],
    ) -> String {
        let tags: Vec<String> = self
            .global_tags
            .iter()
            .cloned()
            .chain(tags.iter().map(|t| sanitize_tag(t)))
            .collect();

        let mut line = String::with_capacity(64);
        line.push_str(&self.prefix);
        line.push_str(name);
        line.push_str(&self.suffix);

        if self.tag_format == TagFormat::Telegraf && !tags.is_empty() {
            for tag in &tags {
                line.push(',');
                line.push_str(&tag.replacen(':', "=", 1));
            }
        }

        let _ = write!(line, ":{value}|{metric_type}");
        if sample_rate < 1.0 {
            let _ = write!(line, "|@{sample_rate}");
        }

        if self.tag_format == TagFormat::Datadog && !tags.is_empty() {
            line.push_str("|#");
            line.push_str(&tags.join(","));
        }

        line
    }

    fn send(&self, line: String, sample_rate: f64) {
        if sample_rate < 1.0 && (sample_rate <= 0.0 || rand::random::<f64>() >= sample_rate) {
            if let Some(telemetry) = &self.telemetry {
                telemetry.statsd_sampled_out_total.inc();
            }
            return;
        }

        match self.socket.send_to(line.as_bytes(), self.target) {
            Ok(bytes) => {
                if let Some(telemetry) = &self.telemetry {
                    telemetry.statsd_packets_sent_total.inc();
                    telemetry.statsd_bytes_sent_total.inc_by(bytes as u64);
                }
            }
            Err(e) => {
                debug!(error = %e, target = %self.target, "Dropped StatsD datagram");
                if let Some(telemetry) = &self.telemetry {
                    telemetry.statsd_send_errors_total.inc();
                }
            }
        }
    }
}

impl MetricsSink for StatsdClient {
    fn increment(&self, name: &str, value: i64, tags: &[String]) {
        let line = self.format_line(name, value, "c", 1.0, tags);
        self.send(line, 1.0);
    }

    fn histogram(&self, name: &str, value: u64, sample_rate: f64, tags: &[String]) {
        let line = self.format_line(name, value, "h", sample_rate, tags);
        self.send(line, sample_rate);
    }
}

/// Strip the characters the line protocol uses as separators.
fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| match c {
            '|' | ',' | '#' | '\n' | '\r' => '_',
            c => c,
        })
        .collect()
}
