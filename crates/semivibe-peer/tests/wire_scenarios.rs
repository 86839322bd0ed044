use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use semivibe_peer::{DeviceServer, ServerConfig, ServerHandle};

fn start_server() -> ServerHandle {
    DeviceServer::bind_with_config(
        "127.0.0.1:0",
        ServerConfig::default().with_poll_interval(Duration::from_millis(20)),
    )
    .expect("server should bind")
    .start()
    .expect("server should start")
}

struct RawClient {
    stream: TcpStream,
}

impl RawClient {
    fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout should apply");
        let mut ack = [0u8; 3];
        stream.read_exact(&mut ack).expect("greeting should arrive");
        assert_eq!(&ack, b"ACK");
        Self { stream }
    }

    fn send(&mut self, command: &[u8]) -> String {
        self.stream.write_all(command).expect("command should send");
        let mut response = [0u8; 6];
        self.stream
            .read_exact(&mut response)
            .expect("response should arrive");
        String::from_utf8(response.to_vec()).expect("response should be ascii")
    }

    fn exit(mut self) {
        self.stream.write_all(b"exit").expect("exit should send");
        let mut buf = [0u8; 1];
        let read = self.stream.read(&mut buf).unwrap_or(0);
        assert_eq!(read, 0, "server should close after exit");
    }
}

#[test]
fn scenario_led_write_then_read() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"310180"), "310080");
    assert_eq!(client.send(b"310000"), "310080");
}

#[test]
fn scenario_heater_is_masked() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"330120"), "330000");
    assert_eq!(client.send(b"330000"), "330000");
}

#[test]
fn scenario_doors_are_masked() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"3401FF"), "340055");
    assert_eq!(client.send(b"340000"), "340055");
}

#[test]
fn scenario_write_to_read_only_is_forbidden() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"100101"), "1FFFFF");
}

#[test]
fn scenario_unknown_region_is_invalid() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"500000"), "2FFFFF");
}

#[test]
fn scenario_reset_register_reads_zero() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"4FE0FF"), "4FE000");
    assert_eq!(client.send(b"4FE000"), "4FE000");
    assert_eq!(client.send(b"4FE1FF"), "4FE0FF");
    assert_eq!(client.send(b"4FE000"), "4FE000");
}

#[test]
fn garbage_is_invalid_and_connection_survives() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"zz!!zz"), "2FFFFF");
    assert_eq!(client.send(b"3102AA"), "2FFFFF");
    assert_eq!(client.send(b"211000"), "211016");
}

#[test]
fn powered_off_actuator_write_is_general() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"4FC100"), "4FC000");
    assert_eq!(client.send(b"102000"), "102003");
    assert_eq!(client.send(b"320110"), "3FFFFF");
    assert_eq!(client.send(b"4FC1F0"), "4FC0F0");
    assert_eq!(client.send(b"320110"), "320010");
}

#[test]
fn exit_closes_only_current_connection() {
    let server = start_server();

    let mut first = RawClient::connect(server.local_addr());
    assert_eq!(first.send(b"310142"), "310042");
    first.exit();

    let mut second = RawClient::connect(server.local_addr());
    assert_eq!(second.send(b"310000"), "310042");
}

#[test]
fn disconnect_without_exit_keeps_server_listening() {
    let server = start_server();

    let first = RawClient::connect(server.local_addr());
    drop(first);

    let mut second = RawClient::connect(server.local_addr());
    assert_eq!(second.send(b"100000"), "1000F3");
}

#[test]
fn frames_split_across_writes_are_reassembled() {
    let server = start_server();
    let mut client = RawClient::connect(server.local_addr());

    client.stream.write_all(b"31").expect("first half should send");
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(client.send(b"0180"), "310080");
}

#[test]
fn direct_access_is_visible_on_the_wire() {
    let server = start_server();
    server
        .direct_access()
        .with_state(|state| {
            state.set_sensor_reading(semivibe_device::Sensor::B, 0x3C);
            state.set_error(semivibe_device::Component::Heater, true);
        })
        .expect("state should be reachable");

    let mut client = RawClient::connect(server.local_addr());
    assert_eq!(client.send(b"221000"), "22103C");
    assert_eq!(client.send(b"103000"), "103040");

    assert_eq!(client.send(b"4FD102"), "4FD002");
    assert_eq!(client.send(b"221000"), "221028");
}
