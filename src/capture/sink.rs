use anyhow::Result;
use std::io::{IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::models::packet::PacketRecord;

/// Receives every packet accepted by the filter
pub trait PacketSink {
    fn accept(&mut self, record: &PacketRecord) -> Result<()>;
}

/// Writes `Packet: src_ip=..., dst_ip=..., protocol=..., length=..., raw_data=...` lines
pub struct TextSink<W: WriteColor> {
    out: W,
}

impl TextSink<StandardStream> {
    /// Stdout, coloured only when it is a terminal
    pub fn stdout() -> Self {
        let choice = if std::io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn label_color(label: &str) -> Color {
    match label {
        "HTTP" => Color::Green,
        "DNS" | "DHCP" => Color::Cyan,
        "TCP" => Color::Blue,
        "UDP" => Color::Magenta,
        "ICMP" | "IGMP" => Color::Yellow,
        _ => Color::Red,
    }
}

impl<W: WriteColor> PacketSink for TextSink<W> {
    fn accept(&mut self, record: &PacketRecord) -> Result<()> {
        write!(
            self.out,
            "Packet: src_ip={}, dst_ip={}, protocol=",
            record.src_ip, record.dst_ip
        )?;
        self.out
            .set_color(ColorSpec::new().set_fg(Some(label_color(&record.protocol_label))))?;
        write!(self.out, "{}", record.protocol_label)?;
        self.out.reset()?;
        writeln!(
            self.out,
            ", length={}, raw_data={}",
            record.length, record.raw_hex
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Writes one JSON object per accepted packet
pub struct JsonSink<W: Write> {
    out: W,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PacketSink for JsonSink<W> {
    fn accept(&mut self, record: &PacketRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
