//! Receiver command channel: vendor start-up commands and the advanced
//! input mode (AIM) used to tunnel RTK corrections through the primary port.

use core::{fmt, str::FromStr};

use log::{debug, info, warn};

use crate::{
    constants::AIM_PREFIX,
    error::{Condition, ConfigError, ModeError},
};

const COMMAND_TERMINATOR: &[u8] = b"\r\n";
const CURRENT_TERMINAL: &str = "/cur/term";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceMode {
    #[default]
    Normal,
    EnteringAim,
    Aim,
    ExitingAim,
}

/// Vendor specific start-up strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CustomInit {
    #[default]
    None,
    /// Javad / TopCon receivers speaking GREIS
    Javad,
}

impl CustomInit {
    pub fn supports_aim(self) -> bool {
        matches!(self, CustomInit::Javad)
    }

    /// Command lines sent once when the session starts.
    pub fn init_commands(self, javad: &JavadConfig) -> Vec<String> {
        match self {
            CustomInit::None => Vec::new(),
            CustomInit::Javad => javad_init_commands(javad),
        }
    }
}

impl FromStr for CustomInit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        if tag.is_empty() {
            Ok(CustomInit::None)
        } else if tag.eq_ignore_ascii_case("JAVAD") || tag.eq_ignore_ascii_case("TopCon") {
            Ok(CustomInit::Javad)
        } else {
            Err(ConfigError::UnknownCustomInit(s.to_string()))
        }
    }
}

impl fmt::Display for CustomInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomInit::None => Ok(()),
            CustomInit::Javad => f.write_str("JAVAD"),
        }
    }
}

/// Javad / TopCon specific options.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JavadConfig {
    /// Receiver port the RTK corrections come in on, e.g. `/dev/ser/b`
    pub rtk_src_port: Option<String>,
    /// Baud rate for `rtk_src_port`, 0 keeps the receiver setting
    pub rtk_src_baud: u32,
    /// `cmr`, `rtcm`, `rtcm3`, ...
    pub rtk_format: String,
    /// Enter AIM right after the start-up commands
    pub use_aim_mode: bool,
    /// Output period of GGA and RMC [s]
    pub data_period: f64,
}

impl Default for JavadConfig {
    fn default() -> Self {
        Self {
            rtk_src_port: None,
            rtk_src_baud: 0,
            rtk_format: "cmr".to_string(),
            use_aim_mode: false,
            data_period: 0.2,
        }
    }
}

impl JavadConfig {
    fn source_port(&self) -> &str {
        self.rtk_src_port
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(CURRENT_TERMINAL)
    }
}

pub fn javad_init_commands(cfg: &JavadConfig) -> Vec<String> {
    // stop all messages, twice to flush whatever the receiver was doing
    let mut cmds = vec!["%%dm".to_string(), "%%dm".to_string()];
    if let Some(port) = cfg.rtk_src_port.as_deref().filter(|p| !p.is_empty()) {
        if !cfg.use_aim_mode {
            cmds.push(format!("%%set,/par{port}/imode,{}", cfg.rtk_format));
        }
        if cfg.rtk_src_baud > 0 {
            cmds.push(format!("%%set,/par{port}/rate,{}", cfg.rtk_src_baud));
        }
        cmds.push(format!("%%set,/par/pos/pd/port,{port}"));
    }
    cmds.push("%%set,/par/lock/elm,5".to_string());
    cmds.push(format!("%%em,,/msg/nmea/GGA:{:.2}", cfg.data_period));
    cmds.push(format!("%%em,,/msg/nmea/RMC:{:.2}", cfg.data_period));
    cmds
}

/// Source port to command mode, three JPS terminal slots, then the current
/// terminal to `jps` input. Each line gets its own reply.
pub fn javad_aim_enter_commands(cfg: &JavadConfig) -> Vec<String> {
    vec![
        format!("%%set,/par{}/imode,cmd", cfg.source_port()),
        "%%set,/par/cur/term/jps/0,{nscmd,37,n,\"\"}".to_string(),
        format!("%%set,/par/cur/term/jps/1,{{cmd,1,y,{}}}", cfg.rtk_format),
        "%%set,/par/cur/term/jps/2,{none,-1,n,\"\"}".to_string(),
        "%%set,/par/cur/term/imode,jps".to_string(),
    ]
}

pub fn javad_aim_exit_commands() -> Vec<String> {
    vec!["%%set,/par/cur/term/imode,cmd".to_string()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `RE` reply
    Ack,
    /// `ER` reply
    Error,
}

/// One GREIS reply. `id` is the command identifier echoed at the start of
/// the body (`%id%`), empty for untagged commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub id: String,
}

const REPLY_HEADER_LEN: usize = 5;
/// Body bytes kept to recover the echoed command id.
const REPLY_ID_CAPTURE: usize = 32;

#[derive(Debug)]
struct ReplyBody {
    kind: ReplyKind,
    remaining: usize,
    head: Vec<u8>,
    emitted: bool,
}

fn reply_id(head: &[u8]) -> String {
    let Some(rest) = head.strip_prefix(b"%") else {
        return String::new();
    };
    match rest.iter().position(|b| *b == b'%') {
        Some(end) => String::from_utf8_lossy(&rest[..end]).into_owned(),
        None => String::new(),
    }
}

/// Finds GREIS replies (`RE`/`ER` + three hex length digits + body) in bytes
/// that are not part of any navigation frame. Replies may be split across calls.
#[derive(Debug, Default)]
pub struct ReplyScanner {
    window: Vec<u8>,
    body: Option<ReplyBody>,
}

impl ReplyScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.body = None;
    }

    pub fn feed(&mut self, bytes: &[u8], replies: &mut Vec<Reply>) {
        for &b in bytes {
            if let Some(body) = &mut self.body {
                body.remaining -= 1;
                if body.head.len() < REPLY_ID_CAPTURE {
                    body.head.push(b);
                }
                let head_done = body.remaining == 0 || body.head.len() == REPLY_ID_CAPTURE;
                if head_done && !body.emitted {
                    body.emitted = true;
                    replies.push(Reply {
                        kind: body.kind,
                        id: reply_id(&body.head),
                    });
                }
                if body.remaining == 0 {
                    self.body = None;
                }
                continue;
            }
            if self.window.len() == REPLY_HEADER_LEN {
                self.window.remove(0);
            }
            self.window.push(b);
            if let Some((kind, body_len)) = Self::header(&self.window) {
                self.window.clear();
                if body_len == 0 {
                    replies.push(Reply {
                        kind,
                        id: String::new(),
                    });
                } else {
                    self.body = Some(ReplyBody {
                        kind,
                        remaining: body_len,
                        head: Vec::new(),
                        emitted: false,
                    });
                }
            }
        }
    }

    fn header(window: &[u8]) -> Option<(ReplyKind, usize)> {
        let [a, b, len @ ..] = window else {
            return None;
        };
        let kind = match (*a, *b) {
            (b'R', b'E') => ReplyKind::Ack,
            (b'E', b'R') => ReplyKind::Error,
            _ => return None,
        };
        if len.len() != REPLY_HEADER_LEN - 2 || !len.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        let digits = core::str::from_utf8(len).ok()?;
        let body_len = usize::from_str_radix(digits, 16).ok()?;
        Some((kind, body_len))
    }
}

/// Gives `cmd` the GREIS identifier `id`, replacing an empty `%%` one.
fn tag_command(cmd: &str, id: &str) -> String {
    let body = cmd.strip_prefix("%%").unwrap_or(cmd);
    format!("%{id}%{body}")
}

/// Drives [`DeviceMode`] and owns the bytes waiting to be written to the receiver.
///
/// Commands of an AIM transition carry their own identifiers (`%aim<n>%`), so
/// replies to untagged start-up commands never count as acknowledgements.
#[derive(Debug)]
pub struct ModeController {
    init: CustomInit,
    javad: JavadConfig,
    mode: DeviceMode,
    scanner: ReplyScanner,
    awaiting: Vec<String>,
    next_tag: u32,
    polls_waited: u32,
    timeout_polls: u32,
    outbox: Vec<u8>,
}

impl ModeController {
    pub fn new(init: CustomInit, javad: JavadConfig, timeout_polls: u32) -> Self {
        Self {
            init,
            javad,
            mode: DeviceMode::Normal,
            scanner: ReplyScanner::new(),
            awaiting: Vec::new(),
            next_tag: 0,
            polls_waited: 0,
            timeout_polls,
            outbox: Vec::new(),
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    /// Queues the start-up commands, then requests AIM if configured to.
    pub fn start(&mut self) -> Result<(), ModeError> {
        for cmd in self.init.init_commands(&self.javad) {
            self.queue_command(&cmd);
        }
        if self.javad.use_aim_mode {
            self.request(true)?;
        }
        Ok(())
    }

    pub fn request(&mut self, enable: bool) -> Result<(), ModeError> {
        if enable {
            if !self.init.supports_aim() {
                return Err(ModeError::Unsupported);
            }
            match self.mode {
                DeviceMode::Aim | DeviceMode::EnteringAim => Ok(()),
                DeviceMode::ExitingAim => Err(ModeError::Busy(DeviceMode::ExitingAim)),
                DeviceMode::Normal => {
                    let cmds = javad_aim_enter_commands(&self.javad);
                    self.begin(DeviceMode::EnteringAim, &cmds);
                    Ok(())
                },
            }
        } else {
            match self.mode {
                DeviceMode::Normal | DeviceMode::ExitingAim => Ok(()),
                DeviceMode::EnteringAim => Err(ModeError::Busy(DeviceMode::EnteringAim)),
                DeviceMode::Aim => {
                    self.begin(DeviceMode::ExitingAim, &javad_aim_exit_commands());
                    Ok(())
                },
            }
        }
    }

    /// Offers bytes that belong to no navigation frame; replies to the
    /// commands of a pending transition advance it.
    pub fn observe(&mut self, bytes: &[u8], conditions: &mut Vec<Condition>) {
        if !self.in_transition() || bytes.is_empty() {
            return;
        }
        let mut replies = Vec::new();
        self.scanner.feed(bytes, &mut replies);
        for reply in replies {
            let Some(pos) = self.awaiting.iter().position(|id| *id == reply.id) else {
                debug!("ignoring {:?} reply to '%{}%'", reply.kind, reply.id);
                continue;
            };
            match reply.kind {
                ReplyKind::Ack => {
                    self.awaiting.swap_remove(pos);
                    if self.awaiting.is_empty() {
                        self.finish();
                        return;
                    }
                },
                ReplyKind::Error => {
                    warn!("receiver rejected '%{}%' while {:?}", reply.id, self.mode);
                    conditions.push(Condition::AimRejected);
                    self.set_mode(DeviceMode::Normal);
                    return;
                },
            }
        }
    }

    /// Counts one polling cycle against the acknowledgement bound.
    pub fn tick(&mut self, conditions: &mut Vec<Condition>) {
        if !self.in_transition() {
            return;
        }
        self.polls_waited += 1;
        if self.polls_waited >= self.timeout_polls {
            warn!(
                "no acknowledgement after {} polls while {:?}, {} missing",
                self.polls_waited,
                self.mode,
                self.awaiting.len()
            );
            conditions.push(Condition::AimTimeout { mode: self.mode });
            self.set_mode(DeviceMode::Normal);
        }
    }

    /// Queues correction bytes behind the AIM prefix.
    pub fn send_correction(&mut self, bytes: &[u8]) -> Result<(), ModeError> {
        if self.mode != DeviceMode::Aim {
            return Err(ModeError::NotInAim);
        }
        self.outbox.extend_from_slice(&AIM_PREFIX);
        self.outbox.extend_from_slice(bytes);
        Ok(())
    }

    /// Transport trouble: get the receiver back to plain command mode.
    pub fn fall_back(&mut self) {
        if matches!(self.mode, DeviceMode::Aim | DeviceMode::EnteringAim) {
            self.begin(DeviceMode::ExitingAim, &javad_aim_exit_commands());
        }
    }

    /// Best-effort exit without waiting for a reply. Returns everything still queued.
    pub fn shutdown(&mut self) -> Vec<u8> {
        if matches!(self.mode, DeviceMode::Aim | DeviceMode::EnteringAim) {
            for cmd in javad_aim_exit_commands() {
                self.queue_command(&cmd);
            }
        }
        self.set_mode(DeviceMode::Normal);
        self.take_outgoing()
    }

    pub fn take_outgoing(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.outbox)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outbox.is_empty()
    }

    fn in_transition(&self) -> bool {
        matches!(self.mode, DeviceMode::EnteringAim | DeviceMode::ExitingAim)
    }

    fn queue_command(&mut self, cmd: &str) {
        self.outbox.extend_from_slice(cmd.as_bytes());
        self.outbox.extend_from_slice(COMMAND_TERMINATOR);
    }

    fn begin(&mut self, target: DeviceMode, cmds: &[String]) {
        self.awaiting.clear();
        for cmd in cmds {
            let id = format!("aim{}", self.next_tag);
            self.next_tag = self.next_tag.wrapping_add(1);
            self.queue_command(&tag_command(cmd, &id));
            self.awaiting.push(id);
        }
        self.polls_waited = 0;
        self.scanner.reset();
        self.set_mode(target);
    }

    fn finish(&mut self) {
        match self.mode {
            DeviceMode::EnteringAim => self.set_mode(DeviceMode::Aim),
            DeviceMode::ExitingAim => self.set_mode(DeviceMode::Normal),
            DeviceMode::Normal | DeviceMode::Aim => {},
        }
    }

    fn set_mode(&mut self, mode: DeviceMode) {
        if self.mode != mode {
            info!("device mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
        if !self.in_transition() {
            self.awaiting.clear();
            self.polls_waited = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const UNTAGGED_ACK: &[u8] = b"RE002%%\r\n";

    fn javad(timeout: u32) -> ModeController {
        ModeController::new(CustomInit::Javad, JavadConfig::default(), timeout)
    }

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }

    /// Identifiers of the tagged commands in `bytes`, in order.
    fn tags(bytes: &[u8]) -> Vec<String> {
        lines(bytes)
            .iter()
            .filter_map(|line| {
                let rest = line.strip_prefix('%')?;
                let id = &rest[..rest.find('%')?];
                (!id.is_empty()).then(|| id.to_string())
            })
            .collect()
    }

    fn ack(id: &str) -> Vec<u8> {
        format!("RE{:03X}%{id}%\r\n", id.len() + 2).into_bytes()
    }

    fn rejection(id: &str) -> Vec<u8> {
        let body = format!("%{id}%{{wrong,arg}}");
        format!("ER{:03X}{body}\r\n", body.len()).into_bytes()
    }

    fn ack_all(ctl: &mut ModeController, conditions: &mut Vec<Condition>) {
        for id in tags(&ctl.take_outgoing()) {
            ctl.observe(&ack(&id), conditions);
        }
    }

    fn ack_reply(id: &str) -> Reply {
        Reply {
            kind: ReplyKind::Ack,
            id: id.to_string(),
        }
    }

    #[test]
    fn custom_init_tags() {
        assert_eq!("".parse(), Ok(CustomInit::None));
        assert_eq!("JAVAD".parse(), Ok(CustomInit::Javad));
        assert_eq!("TopCon".parse(), Ok(CustomInit::Javad));
        assert_eq!("topcon".parse(), Ok(CustomInit::Javad));
        assert_eq!(
            "Trimble".parse::<CustomInit>(),
            Err(ConfigError::UnknownCustomInit("Trimble".to_string()))
        );
    }

    #[test]
    fn javad_init_without_rtk_port() {
        let cmds = javad_init_commands(&JavadConfig::default());
        assert_eq!(
            cmds,
            vec![
                "%%dm",
                "%%dm",
                "%%set,/par/lock/elm,5",
                "%%em,,/msg/nmea/GGA:0.20",
                "%%em,,/msg/nmea/RMC:0.20",
            ]
        );
    }

    #[test]
    fn javad_init_with_rtk_port() {
        let cfg = JavadConfig {
            rtk_src_port: Some("/dev/ser/b".into()),
            rtk_src_baud: 9600,
            data_period: 1.0,
            ..Default::default()
        };
        let cmds = javad_init_commands(&cfg);
        assert!(cmds.contains(&"%%set,/par/dev/ser/b/imode,cmr".to_string()));
        assert!(cmds.contains(&"%%set,/par/dev/ser/b/rate,9600".to_string()));
        assert!(cmds.contains(&"%%set,/par/pos/pd/port,/dev/ser/b".to_string()));
        assert!(cmds.contains(&"%%em,,/msg/nmea/GGA:1.00".to_string()));
    }

    #[test]
    fn aim_enter_sequence() {
        let cmds = javad_aim_enter_commands(&JavadConfig::default());
        assert_eq!(
            cmds,
            vec![
                "%%set,/par/cur/term/imode,cmd",
                "%%set,/par/cur/term/jps/0,{nscmd,37,n,\"\"}",
                "%%set,/par/cur/term/jps/1,{cmd,1,y,cmr}",
                "%%set,/par/cur/term/jps/2,{none,-1,n,\"\"}",
                "%%set,/par/cur/term/imode,jps",
            ]
        );
    }

    #[test]
    fn scanner_handles_split_replies() {
        let mut scanner = ReplyScanner::new();
        let mut replies = Vec::new();
        scanner.feed(b"\r\nR", &mut replies);
        scanner.feed(b"E0", &mut replies);
        scanner.feed(b"06%ai", &mut replies);
        assert!(replies.is_empty());
        scanner.feed(b"m3%\r\nER003abc", &mut replies);
        assert_eq!(
            replies,
            vec![
                ack_reply("aim3"),
                Reply {
                    kind: ReplyKind::Error,
                    id: String::new()
                }
            ]
        );
    }

    #[test]
    fn scanner_skips_reply_body() {
        let mut scanner = ReplyScanner::new();
        let mut replies = Vec::new();
        // the body looks like a reply header itself
        scanner.feed(b"RE005RE000", &mut replies);
        scanner.feed(b"RE000", &mut replies);
        assert_eq!(replies, vec![ack_reply(""), ack_reply("")]);
    }

    #[test]
    fn scanner_reports_long_reply_early() {
        let mut scanner = ReplyScanner::new();
        let mut replies = Vec::new();
        let body = format!("%x%{}", "p".repeat(100));
        scanner.feed(format!("RE{:03X}", body.len()).as_bytes(), &mut replies);
        scanner.feed(&body.as_bytes()[..REPLY_ID_CAPTURE], &mut replies);
        assert_eq!(replies, vec![ack_reply("x")]);
        scanner.feed(&body.as_bytes()[REPLY_ID_CAPTURE..], &mut replies);
        scanner.feed(b"RE002%%", &mut replies);
        assert_eq!(replies.len(), 2);
    }

    #[test]
    fn aim_commands_are_tagged() {
        let mut ctl = javad(5);
        ctl.request(true).unwrap();
        let sent = lines(&ctl.take_outgoing());
        assert_eq!(sent[0], "%aim0%set,/par/cur/term/imode,cmd");
        assert_eq!(sent[4], "%aim4%set,/par/cur/term/imode,jps");
    }

    #[test]
    fn enter_aim_on_acks() {
        let mut ctl = javad(5);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        let ids = tags(&ctl.take_outgoing());
        assert_eq!(ids.len(), 5);

        // replies may come in any order
        for id in ids[1..].iter().rev() {
            ctl.observe(&ack(id), &mut conditions);
        }
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        ctl.observe(&ack(&ids[0]), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Aim);
        assert!(conditions.is_empty());
    }

    #[test]
    fn untagged_replies_do_not_count() {
        let mut ctl = javad(5);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        let ids = tags(&ctl.take_outgoing());
        for _ in 0..10 {
            ctl.observe(UNTAGGED_ACK, &mut conditions);
        }
        ctl.observe(b"ER00B{wrong,arg}\r\n", &mut conditions);
        ctl.observe(&ack(&ids[0]), &mut conditions);
        ctl.observe(&ack(&ids[0]), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        assert!(conditions.is_empty());
    }

    #[test]
    fn startup_acks_then_aim_rejected() {
        let cfg = JavadConfig {
            use_aim_mode: true,
            ..Default::default()
        };
        let mut ctl = ModeController::new(CustomInit::Javad, cfg, 10);
        let mut conditions = Vec::new();
        ctl.start().unwrap();
        let sent = ctl.take_outgoing();
        let ids = tags(&sent);
        assert_eq!(lines(&sent).len(), 10);
        assert_eq!(ids.len(), 5);

        for _ in 0..5 {
            ctl.observe(UNTAGGED_ACK, &mut conditions);
        }
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        for id in &ids[..4] {
            ctl.observe(&ack(id), &mut conditions);
        }
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        ctl.observe(&rejection(&ids[4]), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
        assert_eq!(conditions, vec![Condition::AimRejected]);
    }

    #[test]
    fn enter_aim_times_out() {
        let mut ctl = javad(3);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        ctl.tick(&mut conditions);
        ctl.tick(&mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
        ctl.tick(&mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
        assert_eq!(
            conditions,
            vec![Condition::AimTimeout {
                mode: DeviceMode::EnteringAim
            }]
        );
    }

    #[test]
    fn exit_aim_times_out() {
        let mut ctl = javad(3);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        ack_all(&mut ctl, &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Aim);

        ctl.request(false).unwrap();
        ctl.take_outgoing();
        ctl.tick(&mut conditions);
        ctl.tick(&mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::ExitingAim);
        ctl.tick(&mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
        assert_eq!(
            conditions,
            vec![Condition::AimTimeout {
                mode: DeviceMode::ExitingAim
            }]
        );
        // a late reply changes nothing
        ctl.observe(&ack("aim5"), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
    }

    #[test]
    fn error_reply_aborts_entry() {
        let mut ctl = javad(10);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        let ids = tags(&ctl.take_outgoing());
        ctl.observe(&ack(&ids[0]), &mut conditions);
        ctl.observe(&rejection(&ids[1]), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
        assert_eq!(conditions, vec![Condition::AimRejected]);
    }

    #[test]
    fn aim_not_supported_without_vendor_init() {
        let mut ctl = ModeController::new(CustomInit::None, JavadConfig::default(), 10);
        assert_eq!(ctl.request(true), Err(ModeError::Unsupported));
        assert_eq!(ctl.request(false), Ok(()));
        assert!(!ctl.has_outgoing());
    }

    #[test]
    fn busy_in_opposite_direction() {
        let mut ctl = javad(10);
        ctl.request(true).unwrap();
        assert_eq!(
            ctl.request(false),
            Err(ModeError::Busy(DeviceMode::EnteringAim))
        );
        // repeating is a no-op
        ctl.take_outgoing();
        assert_eq!(ctl.request(true), Ok(()));
        assert!(!ctl.has_outgoing());
    }

    #[test]
    fn exit_aim() {
        let mut ctl = javad(10);
        let mut conditions = Vec::new();
        ctl.request(true).unwrap();
        ack_all(&mut ctl, &mut conditions);
        ctl.request(false).unwrap();
        assert_eq!(ctl.mode(), DeviceMode::ExitingAim);
        assert_eq!(
            ctl.request(true),
            Err(ModeError::Busy(DeviceMode::ExitingAim))
        );
        let sent = ctl.take_outgoing();
        assert_eq!(lines(&sent), vec!["%aim5%set,/par/cur/term/imode,cmd"]);
        ctl.observe(&ack("aim5"), &mut conditions);
        assert_eq!(ctl.mode(), DeviceMode::Normal);
        assert!(conditions.is_empty());
    }

    #[test]
    fn corrections_wrapped_only_in_aim() {
        let mut ctl = javad(10);
        let mut conditions = Vec::new();
        assert_eq!(ctl.send_correction(b"\xd3\x00"), Err(ModeError::NotInAim));
        ctl.request(true).unwrap();
        ack_all(&mut ctl, &mut conditions);
        ctl.send_correction(b"\xd3\x00\x13").unwrap();
        assert_eq!(ctl.take_outgoing(), b">>\xd3\x00\x13".to_vec());
    }

    #[test]
    fn transport_failure_falls_back() {
        let mut ctl = javad(10);
        ctl.request(true).unwrap();
        ctl.take_outgoing();
        ctl.fall_back();
        assert_eq!(ctl.mode(), DeviceMode::ExitingAim);
        assert_eq!(
            lines(&ctl.take_outgoing()),
            vec!["%aim5%set,/par/cur/term/imode,cmd"]
        );
    }

    #[test]
    fn start_queues_init_and_aim() {
        let cfg = JavadConfig {
            use_aim_mode: true,
            ..Default::default()
        };
        let mut ctl = ModeController::new(CustomInit::Javad, cfg, 10);
        ctl.start().unwrap();
        let sent = lines(&ctl.take_outgoing());
        assert_eq!(sent[0], "%%dm");
        assert_eq!(sent.last().unwrap(), "%aim4%set,/par/cur/term/imode,jps");
        assert_eq!(ctl.mode(), DeviceMode::EnteringAim);
    }

    #[test]
    fn shutdown_sends_exit() {
        let mut ctl = javad(10);
        ctl.request(true).unwrap();
        ctl.take_outgoing();
        assert_eq!(ctl.shutdown(), b"%%set,/par/cur/term/imode,cmd\r\n".to_vec());
        assert_eq!(ctl.mode(), DeviceMode::Normal);
    }
}
