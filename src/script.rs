use std::{fs, path::Path};

use anyhow::{Context, Result};
use codec::Packet;
use mlua::{Function, Lua};

/// The optional per-packet transformer. "No script configured" is a
/// variant, not an error: the pipeline branches on the outcome of
/// [`ScriptHook::run`] and falls back to the built-in decoder whenever
/// the hook did not take the packet.
pub enum ScriptHook {
    None,
    Loaded(Script),
}

pub struct Script {
    lua: Lua,
}

impl ScriptHook {
    ///
    /// Load the script at `path`, if any. An unreadable file is a fatal
    /// configuration error; a file that fails to execute only disables
    /// the hook, with a warning.
    ///
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::None);
        };

        let source = fs::read_to_string(path)
            .with_context(|| format!("read script {} failed", path.display()))?;

        let lua = Lua::new();
        if let Err(e) = lua.load(&source).exec() {
            log::warn!("script {} disabled: {e}", path.display());
            return Ok(Self::None);
        }

        log::info!("script {} loaded", path.display());
        Ok(Self::Loaded(Script { lua }))
    }

    ///
    /// Hand the packet to the script's `process` function. Returns true
    /// when the script took the packet, in which case the built-in
    /// decoding is skipped for it.
    ///
    pub fn run(&self, packet: &Packet) -> bool {
        let Self::Loaded(script) = self else {
            return false;
        };

        match script.process(packet) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("run lua script failed: {e}");
                false
            }
        }
    }
}

impl Script {
    fn process(&self, packet: &Packet) -> mlua::Result<()> {
        let args = self.lua.create_table()?;
        args.set("type", format!("[{}]", packet.layers))?;
        args.set("direction", if packet.request { "REQ" } else { "RSP" })?;
        args.set("smac", packet.src_mac.as_str())?;
        args.set(
            "sip",
            packet.src_ip.map(|ip| ip.to_string()).unwrap_or_default(),
        )?;
        args.set(
            "sport",
            packet
                .src_port
                .map(|port| port.to_string())
                .unwrap_or_default(),
        )?;
        args.set("dmac", packet.dst_mac.as_str())?;
        args.set(
            "dip",
            packet.dst_ip.map(|ip| ip.to_string()).unwrap_or_default(),
        )?;
        args.set(
            "dport",
            packet
                .dst_port
                .map(|port| port.to_string())
                .unwrap_or_default(),
        )?;
        args.set(
            "seq",
            packet
                .sequence
                .map(|value| value.to_string())
                .unwrap_or_default(),
        )?;
        args.set(
            "ack",
            packet
                .ack
                .map(|value| value.to_string())
                .unwrap_or_default(),
        )?;
        args.set("flag", packet.flag_str())?;
        args.set("payload", self.lua.create_string(&packet.payload)?)?;
        args.set("payloadlen", packet.payload_len.to_string())?;

        let process: Function = self.lua.globals().get("process")?;
        process.call::<()>(args)
    }
}
