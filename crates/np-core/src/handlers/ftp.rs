//! Stateless per-command FTP control-channel responder. The handler tracks
//! no TCP state of its own beyond what's carried on the inbound segment: a
//! bare `SYN` triggers a synthesized handshake reply and a delayed welcome
//! banner, anything else is read as one command line and answered in place.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use np_packet::{EthernetFrame, Ipv4Packet, MacAddr, TcpFlags, TcpSegment};

use crate::device::Device;
use crate::handlers::{HandlerContext, FTP_PORT};
use crate::serializer;

const WELCOME_BANNER_DELAY: Duration = Duration::from_millis(100);
const PASV_DATA_PORT: u16 = 20000;

pub fn handle(
    ctx: &HandlerContext<'_>,
    eth: &EthernetFrame<'_>,
    ip: &Ipv4Packet<'_>,
    tcp: &TcpSegment<'_>,
) {
    let device = match ctx.devices.get_by_ip(ip.dst).into_iter().next() {
        Some(device) => device,
        None => return,
    };
    if device.ftp.is_none() {
        return;
    }

    let response_mac = serializer::resolve_response_mac(eth.src_mac());

    if tcp.flags.contains(TcpFlags::SYN) && !tcp.flags.contains(TcpFlags::ACK) {
        handle_handshake(ctx, &device, response_mac, ip.dst, ip.src, tcp);
        return;
    }

    if tcp.payload.is_empty() {
        return;
    }

    let raw = String::from_utf8_lossy(tcp.payload);
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return;
    }
    let mut parts = trimmed.splitn(2, ' ');
    let cmd_raw = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    if cmd_raw.is_empty() || !cmd_raw.chars().all(|c| c.is_ascii_alphabetic()) {
        // Doesn't look like an FTP command line at all; not our protocol.
        return;
    }
    let cmd = cmd_raw.to_ascii_uppercase();

    let Some(lines) = command_responses(&device, &cmd, arg) else {
        return;
    };

    let mut seq = tcp.ack;
    let ack = tcp.seq.wrapping_add(tcp.payload.len() as u32);
    for line in lines {
        seq = send_segment(
            ctx,
            &device,
            response_mac,
            ip.dst,
            ip.src,
            tcp.src_port,
            seq,
            ack,
            line.as_bytes(),
        );
    }
}

fn handle_handshake(
    ctx: &HandlerContext<'_>,
    device: &Arc<Device>,
    response_mac: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    tcp: &TcpSegment<'_>,
) {
    ctx.stats.incr_ftp_sessions();

    const SERVER_ISN: u32 = 0;
    let synack_ack = tcp.seq.wrapping_add(1);

    match serializer::build_tcp_frame(
        device.mac,
        response_mac,
        ip_src,
        ip_dst,
        0,
        FTP_PORT,
        tcp.src_port,
        SERVER_ISN,
        synack_ack,
        TcpFlags::SYN | TcpFlags::ACK,
        65535,
        &[],
    ) {
        Ok(frame) => {
            ctx.send(frame, Some(Arc::clone(device)));
        }
        Err(_) => {
            ctx.stats.incr_ser_errors();
            return;
        }
    }

    let egress = Arc::clone(ctx.egress);
    let device = Arc::clone(device);
    let tcp_dst_port = tcp.src_port;
    let banner_seq = SERVER_ISN.wrapping_add(1);
    let banner = welcome_banner_text(&device);

    ctx.scheduler.schedule_after(WELCOME_BANNER_DELAY, move || {
        if let Ok(frame) = serializer::build_tcp_frame(
            device.mac,
            response_mac,
            ip_src,
            ip_dst,
            0,
            FTP_PORT,
            tcp_dst_port,
            banner_seq,
            synack_ack,
            TcpFlags::PSH | TcpFlags::ACK,
            65535,
            banner.as_bytes(),
        ) {
            egress.send(frame, Some(device));
        }
    });
}

/// The text scheduled ~100ms after a handshake completes: the device's
/// configured banner, or a generic one naming it.
pub fn welcome_banner_text(device: &Device) -> String {
    device
        .ftp
        .as_ref()
        .and_then(|f| f.welcome_banner.clone())
        .unwrap_or_else(|| format!("220 {} FTP Server ready\r\n", device.name))
}

#[allow(clippy::too_many_arguments)]
fn send_segment(
    ctx: &HandlerContext<'_>,
    device: &Arc<Device>,
    response_mac: MacAddr,
    ip_src: Ipv4Addr,
    ip_dst: Ipv4Addr,
    dst_port: u16,
    seq: u32,
    ack: u32,
    payload: &[u8],
) -> u32 {
    match serializer::build_tcp_frame(
        device.mac,
        response_mac,
        ip_src,
        ip_dst,
        0,
        FTP_PORT,
        dst_port,
        seq,
        ack,
        TcpFlags::PSH | TcpFlags::ACK,
        65535,
        payload,
    ) {
        Ok(frame) => {
            ctx.send(frame, Some(Arc::clone(device)));
        }
        Err(_) => ctx.stats.incr_ser_errors(),
    }
    seq.wrapping_add(payload.len() as u32)
}

fn command_responses(device: &Device, cmd: &str, arg: Option<&str>) -> Option<Vec<String>> {
    match cmd {
        "USER" => Some(vec![if arg.is_some() {
            "331 User name okay, need password.\r\n".to_string()
        } else {
            "501 Syntax error in parameters.\r\n".to_string()
        }]),
        "PASS" => Some(vec!["230 User logged in, proceed.\r\n".to_string()]),
        "SYST" => {
            let system_type = device
                .ftp
                .as_ref()
                .and_then(|f| f.system_type.clone())
                .unwrap_or_else(|| "UNIX Type: L8".to_string());
            Some(vec![format!("215 {}\r\n", system_type)])
        }
        "PWD" => Some(vec!["257 \"/\" is the current directory.\r\n".to_string()]),
        "TYPE" => Some(vec![match arg {
            Some(a) => format!("200 Type set to {}.\r\n", a),
            None => "501 Syntax error in parameters.\r\n".to_string(),
        }]),
        "PASV" => Some(vec![match device.primary_ip() {
            Some(ip) => {
                let [a, b, c, d] = ip.octets();
                let p1 = (PASV_DATA_PORT >> 8) as u8;
                let p2 = (PASV_DATA_PORT & 0xff) as u8;
                format!("227 Entering Passive Mode ({a},{b},{c},{d},{p1},{p2}).\r\n")
            }
            None => "500 Passive mode unavailable.\r\n".to_string(),
        }]),
        "LIST" => Some(vec![
            "150 Opening ASCII mode data connection for file list.\r\n".to_string(),
            "226 Transfer complete.\r\n".to_string(),
        ]),
        "RETR" => Some(vec!["550 Failed to open file.\r\n".to_string()]),
        "STOR" => Some(vec!["553 Requested action not taken.\r\n".to_string()]),
        "DELE" => Some(vec!["550 Failed to delete file.\r\n".to_string()]),
        "CWD" | "CDUP" => Some(vec!["250 Directory successfully changed.\r\n".to_string()]),
        "MKD" => Some(vec![format!("257 \"{}\" created.\r\n", arg.unwrap_or("/"))]),
        "RMD" => Some(vec!["250 Directory successfully removed.\r\n".to_string()]),
        "NOOP" => Some(vec!["200 NOOP ok.\r\n".to_string()]),
        "QUIT" => Some(vec!["221 Goodbye.\r\n".to_string()]),
        "HELP" => Some(vec![
            "214-The following commands are recognized.\r\n".to_string(),
            "214 USER PASS SYST PWD TYPE PASV LIST RETR STOR DELE CWD CDUP MKD RMD NOOP QUIT HELP\r\n"
                .to_string(),
        ]),
        other if (2..=4).contains(&other.len()) => {
            Some(vec!["502 Command not implemented.\r\n".to_string()])
        }
        _ => None,
    }
}
