//! Vendor control operations: line settings, flow control, modem lines

use super::SerialLink;
use crate::config::LineSettings;
use crate::error::Result;
use crate::transport::Transport;
use protocol::{
    CommStatus, ControlOut, DataBits, FlowControl, HandshakeLine, LineControl, ModemStatus,
    Parity, SpecialChars, StopBits,
};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

impl<T: Transport> SerialLink<T> {
    /// Program a new baud rate
    ///
    /// The cached rate changes only once the chip accepted the request.
    pub fn set_baud_rate(&mut self, rate: u32) -> Result<()> {
        self.shared.send(&ControlOut::baud_rate(rate))?;
        self.baud_rate = rate;
        debug!("Baud rate set to {}", rate);
        Ok(())
    }

    /// Read the line-control word from the chip
    pub fn line_control(&self) -> Result<LineControl> {
        self.shared.line_control()
    }

    /// Write the full line-control word
    pub fn set_line_control(&self, word: LineControl) -> Result<()> {
        self.shared.send(&ControlOut::line_control(word))?;
        Ok(())
    }

    pub fn set_data_bits(&self, data_bits: DataBits) -> Result<()> {
        self.update_line_control(|word| word.with_data_bits(data_bits))
    }

    pub fn set_parity(&self, parity: Parity) -> Result<()> {
        self.update_line_control(|word| word.with_parity(parity))
    }

    pub fn set_stop_bits(&self, stop_bits: StopBits) -> Result<()> {
        self.update_line_control(|word| word.with_stop_bits(stop_bits))
    }

    fn update_line_control(&self, change: impl FnOnce(LineControl) -> LineControl) -> Result<()> {
        let current = self.shared.line_control()?;
        let word = change(current);
        debug!("Line control {:#06x} -> {:#06x}", current.raw(), word.raw());
        self.set_line_control(word)
    }

    /// Switch the flow-control mode
    ///
    /// RTS/CTS and DSR/DTR raise their handshake line, seed the status flag
    /// from one comm-status sample and keep it current with the flow-poll
    /// thread. The link only switches to the new mode once every transfer
    /// succeeded. XON/XOFF only programs the chip: the poll thread and the
    /// hardware flow flags are left as they were.
    pub fn set_flow_control(&mut self, mode: FlowControl) -> Result<()> {
        let span = self.span.clone();
        let _entered = span.enter();

        if mode.uses_status_lines() {
            self.enable_status_line_flow(mode)?;
        } else if mode == FlowControl::XonXoff {
            self.shared
                .send(&ControlOut::special_chars(SpecialChars::default()))?;
            self.shared.send(&ControlOut::flow_control(mode))?;
        } else {
            self.disable_flow_control()?;
        }

        info!("Flow control: {:?}", mode);
        Ok(())
    }

    fn enable_status_line_flow(&mut self, mode: FlowControl) -> Result<()> {
        let rts_cts = mode == FlowControl::RtsCts;
        let line = if rts_cts {
            HandshakeLine::Rts
        } else {
            HandshakeLine::Dtr
        };

        self.shared.send(&ControlOut::flow_control(mode))?;
        self.shared.send(&ControlOut::handshake(line, true))?;
        let status = self.shared.comm_status()?;

        if rts_cts {
            self.shared.cts.store(status.cts_clear(), Ordering::Release);
        } else {
            self.shared.dsr.store(status.dsr_clear(), Ordering::Release);
        }
        self.shared.rts_cts_enabled.store(rts_cts, Ordering::Release);
        self.shared.dtr_dsr_enabled.store(!rts_cts, Ordering::Release);
        self.start_flow_pump()
    }

    /// Apply data bits, parity, stop bits and flow control in one go
    ///
    /// The line-control word is rewritten once; flow control is only touched
    /// when a mode other than OFF is requested, since open already sends OFF.
    pub fn apply_line_settings(&mut self, settings: &LineSettings) -> Result<()> {
        self.update_line_control(|word| {
            word.with_data_bits(settings.data_bits)
                .with_parity(settings.parity)
                .with_stop_bits(settings.stop_bits)
        })?;
        if settings.flow_control != FlowControl::Off {
            self.set_flow_control(settings.flow_control)?;
        }
        Ok(())
    }

    pub fn set_break(&self, on: bool) -> Result<()> {
        self.shared.send(&ControlOut::break_state(on))?;
        Ok(())
    }

    pub fn set_rts(&self, on: bool) -> Result<()> {
        self.shared
            .send(&ControlOut::handshake(HandshakeLine::Rts, on))?;
        Ok(())
    }

    pub fn set_dtr(&self, on: bool) -> Result<()> {
        self.shared
            .send(&ControlOut::handshake(HandshakeLine::Dtr, on))?;
        Ok(())
    }

    /// Sample the modem status byte
    pub fn modem_status(&self) -> Result<ModemStatus> {
        self.shared.modem_status()
    }

    /// Sample the 19-byte comm status block
    pub fn comm_status(&self) -> Result<CommStatus> {
        self.shared.comm_status()
    }

    /// Flush the chip's FIFOs; does nothing when neither side is selected
    pub fn purge_hw_buffers(&self, rx: bool, tx: bool) -> Result<()> {
        if let Some(command) = ControlOut::purge(rx, tx) {
            self.shared.send(&command)?;
        }
        Ok(())
    }
}
