/*!
UDP transport to the robot controller.

One JSON document per datagram. The link runs a current-thread tokio runtime
on its own OS thread: outbound documents arrive over a crossbeam channel and
robot commands are polled with a timeout between sends.
*/

use crate::config::MessagingConfig;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sweep::messages::{LidarMessage, RobotCommand, RobotMessage, SensorMessage};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Largest robot command we accept
const RECV_BUFFER_BYTES: usize = 2048;

/// Counters for the robot link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub send_errors: u64,
    pub received: u64,
    pub malformed: u64,
}

/// Run the robot link until `running` clears and the outbound queue is drained
pub fn run_link(
    config: MessagingConfig,
    outbound: Receiver<LidarMessage>,
    commands: Sender<RobotCommand>,
    running: Arc<AtomicBool>,
) -> Result<LinkStats> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build messaging runtime")?;
    rt.block_on(link_loop(config, outbound, commands, running))
}

async fn link_loop(
    config: MessagingConfig,
    outbound: Receiver<LidarMessage>,
    commands: Sender<RobotCommand>,
    running: Arc<AtomicBool>,
) -> Result<LinkStats> {
    let robot: SocketAddr = config
        .robot_addr
        .parse()
        .with_context(|| format!("Invalid robot address: {}", config.robot_addr))?;

    info!("🔌 Binding UDP socket to {}", config.bind_addr);
    let socket = UdpSocket::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    let sock_ref = socket2::SockRef::from(&socket);
    sock_ref.set_send_buffer_size(config.send_buffer_bytes)?;
    info!("📡 Sending to robot at {}", robot);

    let mut stats = LinkStats::default();
    let mut buffer = vec![0u8; RECV_BUFFER_BYTES];
    let started = Instant::now();

    loop {
        // drain everything queued before waiting on the socket
        loop {
            match outbound.try_recv() {
                Ok(message) => send(&socket, robot, message, &mut stats).await,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Outbound channel closed - analysis has stopped");
                    return Ok(finish(stats, started));
                }
            }
        }

        if !running.load(Ordering::SeqCst) && outbound.is_empty() {
            break;
        }

        match tokio::time::timeout(config.recv_timeout(), socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, from))) => {
                stats.received += 1;
                match parse_command(&buffer[..len]) {
                    Some(command) => {
                        debug!("robot command from {}: {:?}", from, command);
                        if commands.send(command).is_err() {
                            warn!("Command channel closed, dropping robot command");
                        }
                    }
                    None => {
                        stats.malformed += 1;
                        debug!("ignoring malformed datagram from {} ({} bytes)", from, len);
                    }
                }
            }
            Ok(Err(e)) => {
                error!("UDP receive error: {}", e);
            }
            Err(_) => {
                // Timeout - continue to check the outbound queue and running flag
                continue;
            }
        }
    }

    Ok(finish(stats, started))
}

async fn send(socket: &UdpSocket, robot: SocketAddr, message: LidarMessage, stats: &mut LinkStats) {
    let document = match SensorMessage::lidar(message).encode() {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to encode message: {}", e);
            stats.send_errors += 1;
            return;
        }
    };

    match socket.send_to(document.as_bytes(), robot).await {
        Ok(_) => stats.sent += 1,
        Err(e) => {
            // the robot may not be listening yet
            debug!("send to {} failed: {}", robot, e);
            stats.send_errors += 1;
        }
    }
}

/// Decode one datagram into a robot command
pub fn parse_command(datagram: &[u8]) -> Option<RobotCommand> {
    let text = std::str::from_utf8(datagram).ok()?;
    RobotMessage::decode(text.trim()).ok().map(|m| m.command())
}

fn finish(stats: LinkStats, started: Instant) -> LinkStats {
    info!("📈 Robot link final stats:");
    info!("   Sent: {}", stats.sent);
    info!("   Send errors: {}", stats.send_errors);
    info!("   Received: {}", stats.received);
    info!("   Malformed: {}", stats.malformed);
    info!("   Duration: {:.1}s", started.elapsed().as_secs_f64());
    stats
}
