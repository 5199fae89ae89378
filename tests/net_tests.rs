//! End-to-end websocket tests

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use archipelago::config::ServerSettings;
    use archipelago::grid::WorldGrid;
    use archipelago::islands;
    use archipelago::net::WorldServer;
    use archipelago::player::Direction;
    use archipelago::protocol::{ClientMessage, NewPlayer, ServerMessage};
    use archipelago::service::SyncServer;
    use archipelago::tiles::{TileKind, EMPTY};
    use futures_util::{SinkExt, StreamExt};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{client_async, connect_async, MaybeTlsStream, WebSocketStream};

    type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn land_grid() -> WorldGrid {
        let base = vec![TileKind::Land.id(); 64];
        let (isl, n) = islands::label(&base, 8, 8, TileKind::Land.id());
        WorldGrid::from_parts(8, 8, 16, 32, vec![base, vec![EMPTY; 64], vec![EMPTY; 64]], isl, n)
            .unwrap()
    }

    fn local_settings() -> ServerSettings {
        ServerSettings {
            bind: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    /// Next server message, skipping control frames. `None` once the socket
    /// is closed.
    async fn next_message(ws: &mut Ws) -> Option<ServerMessage> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for a frame")?;
            match frame {
                Ok(Message::Text(text)) => return Some(ServerMessage::decode(&text).unwrap()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn two_clients_join_register_and_see_each_other() {
        let server = SyncServer::with_grid(local_settings(), land_grid(), StdRng::seed_from_u64(5));
        let handle = tokio_test::assert_ok!(WorldServer::new(server).start().await);
        let url = format!("ws://{}", handle.local_addr());

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let mut kinds = Vec::new();
        for _ in 0..3 {
            kinds.push(next_message(&mut a).await.unwrap().kind());
        }
        assert_eq!(kinds, ["map", "players", "self"]);

        let (mut b, _) = connect_async(url.as_str()).await.unwrap();
        for _ in 0..3 {
            next_message(&mut b).await.unwrap();
        }
        match next_message(&mut a).await.unwrap() {
            ServerMessage::Info(text) => assert!(text.ends_with("joined the server!")),
            other => panic!("unexpected {:?}", other),
        }

        let register = ClientMessage::NewPlayer(NewPlayer {
            x: 40.0,
            y: 40.0,
            width: 20.0,
            height: 20.0,
            dir: Direction::Left,
            moving: false,
        });
        a.send(Message::Text(register.encode().unwrap())).await.unwrap();

        match next_message(&mut b).await.unwrap() {
            ServerMessage::NewPlayer(joined) => {
                assert_eq!(joined.player.x, 40.0);
                assert_eq!(joined.player.dir, Direction::Left);
            }
            other => panic!("unexpected {:?}", other),
        }

        // A leaves; B is told to delete its player.
        a.close(None).await.unwrap();
        match next_message(&mut b).await.unwrap() {
            ServerMessage::DeletePlayer(_) => {}
            other => panic!("unexpected {:?}", other),
        }

        handle.stop().await;
        assert!(next_message(&mut b).await.is_none());
    }

    #[tokio::test]
    async fn malformed_frames_do_not_drop_the_connection() {
        let server = SyncServer::with_grid(local_settings(), land_grid(), StdRng::seed_from_u64(6));
        let handle = WorldServer::new(server).start().await.unwrap();
        let shared = handle.server();
        let url = format!("ws://{}", handle.local_addr());

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        for _ in 0..3 {
            next_message(&mut a).await.unwrap();
        }
        a.send(Message::Text("{{{".into())).await.unwrap();
        a.send(Message::Text(r#"{"type":"nope"}"#.into())).await.unwrap();

        // A second client's join still reaches A.
        let (_b, _) = connect_async(url.as_str()).await.unwrap();
        assert!(matches!(
            next_message(&mut a).await,
            Some(ServerMessage::Info(_))
        ));
        assert_eq!(shared.lock().stats().active_sessions, 2);

        handle.stop().await;
    }

    #[tokio::test]
    async fn silent_peer_is_timed_out_and_its_socket_closed() {
        let settings = ServerSettings {
            heartbeat_secs: 1,
            ..local_settings()
        };
        let server = SyncServer::with_grid(settings, land_grid(), StdRng::seed_from_u64(7));
        let handle = WorldServer::new(server).start().await.unwrap();
        let shared = handle.server();
        let addr = handle.local_addr();

        // Upgrade, then only read raw bytes: no pong ever goes back.
        let tcp = TcpStream::connect(addr).await.unwrap();
        let (mut ws, _) = client_async(format!("ws://{}", addr), tcp).await.unwrap();
        let socket = ws.get_mut();
        let mut buf = [0u8; 4096];
        let eof = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => continue,
                }
            }
        })
        .await;

        assert!(eof.is_ok(), "server kept the socket open");
        assert_eq!(shared.lock().stats().sessions, 0);
        handle.stop().await;
    }
}
