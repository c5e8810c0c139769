//! Integration tests: whole event streams pushed through `State::dispatch`,
//! checked through the public read accessors.
//!
//! Offline eviction tests run on a paused tokio clock so the grace period
//! elapses instantly and deterministically.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::StateConfig;
    use crate::engine::events::{GatewayEvent, MessageDeleteBulk};
    use crate::engine::permissions::Permissions;
    use crate::engine::state::State;
    use crate::error::StateError;
    use crate::model::{
        Channel, ChannelId, ChannelType, Guild, GuildId, Member, Message, MessageId,
        OverwriteKind, PermissionOverwrite, Presence, Role, RoleId, Status, TargetId, User,
        UserId,
    };

    // ── Helpers ──────────────────────────────────────────────────

    const GUILD: GuildId = GuildId(500);
    const GENERAL: ChannelId = ChannelId(501);
    const OWNER: UserId = UserId(1);

    fn frame(json: &str) -> GatewayEvent {
        serde_json::from_str(json).expect("valid frame")
    }

    fn user(id: u64) -> User {
        User {
            id: UserId(id),
            username: format!("user{id}"),
            discriminator: "0001".into(),
            ..Default::default()
        }
    }

    fn text_channel(id: ChannelId) -> Channel {
        Channel {
            id,
            kind: ChannelType::GuildText,
            name: format!("chan{}", id.get()),
            ..Default::default()
        }
    }

    fn guild_with(channels: Vec<Channel>, members: Vec<Member>) -> Guild {
        Guild {
            id: GUILD,
            name: "test guild".into(),
            owner_id: OWNER,
            roles: Some(vec![Role {
                id: RoleId(GUILD.get()),
                name: "@everyone".into(),
                permissions: Permissions::READ_MESSAGES | Permissions::SEND_MESSAGES,
                ..Default::default()
            }]),
            channels: Some(channels),
            members: Some(members),
            ..Default::default()
        }
    }

    fn member(id: u64, roles: &[u64]) -> Member {
        Member {
            guild_id: Some(GUILD),
            user: user(id),
            roles: Some(roles.iter().copied().map(RoleId).collect()),
            ..Default::default()
        }
    }

    fn presence(id: u64, status: Status) -> GatewayEvent {
        GatewayEvent::PresenceUpdate(Presence {
            user: User {
                id: UserId(id),
                ..Default::default()
            },
            guild_id: Some(GUILD),
            status: Some(status),
            ..Default::default()
        })
    }

    fn message(id: u64) -> GatewayEvent {
        GatewayEvent::MessageCreate(Message {
            id: MessageId(id),
            channel_id: GENERAL,
            guild_id: Some(GUILD),
            author: Some(user(2)),
            content: format!("message {id}"),
            ..Default::default()
        })
    }

    fn state_with_guild(config: StateConfig) -> State {
        let state = State::new(config);
        state.dispatch(&GatewayEvent::GuildCreate(guild_with(
            vec![text_channel(GENERAL)],
            vec![member(2, &[])],
        )));
        state
    }

    fn eviction_config() -> StateConfig {
        let mut config = StateConfig::default();
        config.members.remove_offline_members = true;
        config
    }

    fn has_member(state: &State, id: u64) -> bool {
        state
            .guild(GUILD)
            .is_some_and(|g| g.member_copy(UserId(id)).is_some())
    }

    // ── Wire frames ──────────────────────────────────────────────

    #[test]
    fn test_frame_stream_builds_state() {
        let state = State::new(StateConfig::default());
        let frames = [
            r#"{"t":"READY","d":{"user":{"id":"1","username":"bot","bot":true},"session_id":"s","private_channels":[],"guilds":[{"id":"500","unavailable":true}]}}"#,
            r#"{"t":"GUILD_CREATE","d":{"id":"500","name":"test guild","owner_id":"1","channels":[{"id":"501","type":0,"name":"general"}],"members":[{"user":{"id":"2","username":"alice","discriminator":"0007"},"roles":[],"joined_at":"2020-01-01T00:00:00+00:00"}]}}"#,
            r#"{"t":"MESSAGE_CREATE","d":{"id":"900","channel_id":"501","guild_id":"500","content":"hello","timestamp":"2020-01-01T00:00:01+00:00"}}"#,
            r#"{"t":"MESSAGE_UPDATE","d":{"id":"900","channel_id":"501","content":"hello!","edited_timestamp":"2020-01-01T00:00:05+00:00"}}"#,
            r#"{"t":"PRESENCE_UPDATE","d":{"user":{"id":"2"},"guild_id":"500","status":"dnd","game":{"name":"chess","type":0}}}"#,
        ];
        for raw in frames {
            assert!(state.dispatch(&frame(raw)), "frame not applied: {raw}");
        }

        assert_eq!(state.current_user().unwrap().username, "bot");
        let guild = state.guild(GUILD).unwrap();
        assert_eq!(guild.light_copy().name, "test guild");

        let alice = guild.member_copy(UserId(2)).unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.discriminator, 7);
        assert_eq!(alice.status, Some(Status::Dnd));

        let msg = state.channel(GENERAL).unwrap().message(MessageId(900)).unwrap();
        assert_eq!(msg.message.content, "hello!");
        assert!(msg.parsed_created.is_some());
        assert!(msg.parsed_edited.is_some());
    }

    #[test]
    fn test_second_ready_keeps_loaded_guilds() {
        let state = State::new(StateConfig::default());
        let ready = frame(
            r#"{"t":"READY","d":{"user":{"id":"1"},"private_channels":[{"id":"77","type":1}],"guilds":[{"id":"500","unavailable":true}]}}"#,
        );
        state.dispatch(&ready);
        state.dispatch(&GatewayEvent::GuildCreate(guild_with(
            vec![text_channel(GENERAL)],
            vec![],
        )));
        state.dispatch(&message(1));

        let private = state.channel(ChannelId(77)).unwrap();
        state.dispatch(&ready);

        let guild = state.guild(GUILD).unwrap();
        let local = guild.channel(GENERAL).unwrap();
        let global = state.channel(GENERAL).unwrap();
        assert!(Arc::ptr_eq(&local, &global));
        assert_eq!(global.message_count(), 1);
        assert!(Arc::ptr_eq(&private, &state.channel(ChannelId(77)).unwrap()));
        assert_eq!(state.stats().guilds, 1);
    }

    #[test]
    fn test_guild_create_with_malformed_positions_is_applied() {
        let state = State::new(StateConfig::default());
        let create = frame(
            r#"{"t":"GUILD_CREATE","d":{"id":"500","name":"test guild","owner_id":"1","member_count":"2","roles":[{"id":"500","name":"@everyone","position":null,"permissions":"3072"},{"id":"9","name":"mods","position":"2","hoist":null}],"channels":[{"id":"501","type":"0","name":"general","position":"3","nsfw":null},{"id":"502","type":null,"name":"offtopic","position":{"bad":true}}],"members":[{"user":{"id":"2","username":"alice","bot":null},"roles":["9"],"deaf":0}]}}"#,
        );
        assert!(state.dispatch(&create));

        let guild = state.guild(GUILD).unwrap();
        assert_eq!(guild.channel_count(), 2);
        assert_eq!(guild.member_count(), 1);
        assert_eq!(guild.role(RoleId(500)).unwrap().position, 0);
        assert_eq!(guild.role(RoleId(9)).unwrap().position, 2);

        let general = state.channel_copy(GENERAL).unwrap();
        assert_eq!(general.position, 3);
        assert_eq!(general.kind, ChannelType::GuildText);
        assert_eq!(state.channel_copy(ChannelId(502)).unwrap().position, 0);

        let perms = state.member_permissions(GENERAL, UserId(2)).unwrap();
        assert!(perms.contains(Permissions::SEND_MESSAGES));
    }

    // ── Channels and the global index ────────────────────────────

    #[test]
    fn test_guild_channels_share_handles_with_index() {
        let state = state_with_guild(StateConfig::default());
        let create = GatewayEvent::ChannelCreate(Channel {
            guild_id: Some(GUILD),
            ..text_channel(ChannelId(502))
        });
        assert!(state.dispatch(&create));
        assert!(state.dispatch(&create));

        let guild = state.guild(GUILD).unwrap();
        assert_eq!(guild.channel_count(), 2);
        let from_guild = guild.channel(ChannelId(502)).unwrap();
        let from_index = state.channel(ChannelId(502)).unwrap();
        assert!(Arc::ptr_eq(&from_guild, &from_index));
        assert_eq!(from_index.guild_id(), Some(GUILD));
    }

    #[test]
    fn test_guild_delete_leaves_no_index_entries() {
        let state = state_with_guild(StateConfig::default());
        let handle = state.channel(GENERAL).unwrap();
        state.dispatch(&frame(r#"{"t":"GUILD_DELETE","d":{"id":"500"}}"#));

        assert!(state.guild(GUILD).is_none());
        assert!(state.channel(GENERAL).is_none());
        // Outstanding handles go stale instead of dangling.
        assert!(handle.snapshot().is_none());
    }

    #[test]
    fn test_channel_update_keeps_overwrites() {
        let state = state_with_guild(StateConfig::default());
        let with_overwrites = Channel {
            guild_id: Some(GUILD),
            permission_overwrites: Some(vec![PermissionOverwrite {
                id: TargetId(GUILD.get()),
                kind: OverwriteKind::Role,
                deny: Permissions::SEND_MESSAGES,
                ..Default::default()
            }]),
            ..text_channel(GENERAL)
        };
        state.dispatch(&GatewayEvent::ChannelUpdate(with_overwrites));
        state.dispatch(&GatewayEvent::ChannelUpdate(Channel {
            guild_id: Some(GUILD),
            topic: Some("rules".into()),
            ..text_channel(GENERAL)
        }));

        let deep = state.channel_copy_deep(GENERAL).unwrap();
        assert_eq!(deep.topic.as_deref(), Some("rules"));
        assert_eq!(deep.overwrites().len(), 1);
        assert!(state.channel_copy(GENERAL).unwrap().permission_overwrites.is_none());

        let perms = state.member_permissions(GENERAL, UserId(2)).unwrap();
        assert!(perms.contains(Permissions::READ_MESSAGES));
        assert!(!perms.contains(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let state = state_with_guild(StateConfig::default());
        let mut copy = state.channel_copy_deep(GENERAL).unwrap();
        copy.name = "vandalised".into();
        copy.permission_overwrites = Some(vec![PermissionOverwrite::default()]);

        let fresh = state.channel_copy_deep(GENERAL).unwrap();
        assert_eq!(fresh.name, "chan501");
        assert!(fresh.overwrites().is_empty());
    }

    // ── Message window ───────────────────────────────────────────

    #[test]
    fn test_window_keeps_latest_hundred() {
        let state = state_with_guild(StateConfig::default());
        state.dispatch(&message(1));
        state.dispatch(&message(2));
        for id in 3..153 {
            state.dispatch(&message(id));
        }

        let channel = state.channel(GENERAL).unwrap();
        assert_eq!(channel.message_count(), 100);
        let ids: Vec<u64> = channel
            .messages_latest(100)
            .iter()
            .map(|m| m.id().get())
            .collect();
        assert_eq!(ids, (53..153).collect::<Vec<_>>());
        assert!(channel.message(MessageId(1)).is_none());
    }

    #[test]
    fn test_unbounded_window() {
        let mut config = StateConfig::default();
        config.messages.max_channel_messages = -1;
        let state = state_with_guild(config);
        for id in 0..250 {
            state.dispatch(&message(id));
        }
        assert_eq!(state.channel(GENERAL).unwrap().message_count(), 250);
    }

    #[test]
    fn test_update_before_create() {
        let state = state_with_guild(StateConfig::default());
        state.dispatch(&GatewayEvent::MessageUpdate(Message {
            id: MessageId(7),
            channel_id: GENERAL,
            content: "edited first".into(),
            edited_timestamp: "2021-06-01T00:00:00+00:00".into(),
            ..Default::default()
        }));
        state.dispatch(&message(7));

        let channel = state.channel(GENERAL).unwrap();
        assert_eq!(channel.message_count(), 1);
        let m = channel.message(MessageId(7)).unwrap();
        assert_eq!(m.message.content, "message 7");
        assert!(m.parsed_edited.is_some());
        assert_eq!(m.message.author.as_ref().map(|a| a.id), Some(UserId(2)));
    }

    #[test]
    fn test_bulk_delete_removes_listed_messages() {
        let state = state_with_guild(StateConfig::default());
        for id in 1..=4 {
            state.dispatch(&message(id));
        }
        assert!(state.dispatch(&GatewayEvent::MessageDeleteBulk(MessageDeleteBulk {
            ids: vec![MessageId(1), MessageId(3), MessageId(99)],
            channel_id: GENERAL,
            guild_id: Some(GUILD),
        })));
        let ids: Vec<u64> = state
            .channel(GENERAL)
            .unwrap()
            .messages_latest(10)
            .iter()
            .map(|m| m.id().get())
            .collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_recreate_keeps_messages_of_surviving_channels() {
        let state = State::new(StateConfig::default());
        let gone = ChannelId(502);
        state.dispatch(&GatewayEvent::GuildCreate(guild_with(
            vec![text_channel(GENERAL), text_channel(gone)],
            vec![],
        )));
        state.dispatch(&message(1));
        state.dispatch(&GatewayEvent::MessageCreate(Message {
            id: MessageId(2),
            channel_id: gone,
            ..Default::default()
        }));

        state.dispatch(&GatewayEvent::GuildCreate(guild_with(
            vec![text_channel(GENERAL), text_channel(ChannelId(503))],
            vec![],
        )));

        let general = state.channel(GENERAL).unwrap();
        assert!(general.message(MessageId(1)).is_some());
        assert!(state.channel(gone).is_none());
        assert!(state.guild(GUILD).unwrap().channel(gone).is_none());
        assert_eq!(state.stats().messages, 1);
    }

    // ── Permissions ──────────────────────────────────────────────

    #[test]
    fn test_owner_has_everything_despite_overwrites() {
        let state = state_with_guild(StateConfig::default());
        state.dispatch(&GatewayEvent::ChannelUpdate(Channel {
            guild_id: Some(GUILD),
            permission_overwrites: Some(vec![PermissionOverwrite {
                id: TargetId(OWNER.get()),
                kind: OverwriteKind::Member,
                deny: Permissions::all(),
                ..Default::default()
            }]),
            ..text_channel(GENERAL)
        }));
        assert_eq!(
            state.member_permissions(GENERAL, OWNER),
            Ok(Permissions::all())
        );
    }

    #[test]
    fn test_role_allow_wins_over_role_deny() {
        let state = State::new(StateConfig::default());
        let mut guild = guild_with(
            vec![Channel {
                permission_overwrites: Some(vec![
                    PermissionOverwrite {
                        id: TargetId(10),
                        kind: OverwriteKind::Role,
                        deny: Permissions::ATTACH_FILES,
                        ..Default::default()
                    },
                    PermissionOverwrite {
                        id: TargetId(11),
                        kind: OverwriteKind::Role,
                        allow: Permissions::ATTACH_FILES,
                        ..Default::default()
                    },
                ]),
                ..text_channel(GENERAL)
            }],
            vec![member(2, &[10, 11])],
        );
        guild.roles.as_mut().unwrap().extend([
            Role {
                id: RoleId(10),
                ..Default::default()
            },
            Role {
                id: RoleId(11),
                ..Default::default()
            },
        ]);
        state.dispatch(&GatewayEvent::GuildCreate(guild));

        let perms = state.member_permissions(GENERAL, UserId(2)).unwrap();
        assert!(perms.contains(Permissions::ATTACH_FILES));
    }

    #[test]
    fn test_permissions_for_unknown_member_and_channel() {
        let state = state_with_guild(StateConfig::default());
        let guild = state.guild(GUILD).unwrap();
        assert_eq!(
            guild.member_permissions(GENERAL, UserId(77)),
            Err(StateError::MemberNotFound(UserId(77)))
        );
        assert_eq!(
            guild.member_permissions(ChannelId(1), UserId(2)),
            Err(StateError::ChannelNotFound(ChannelId(1)))
        );
    }

    // ── Offline eviction ─────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_offline_member_evicted_after_grace() {
        let state = state_with_guild(eviction_config());
        state.dispatch(&presence(2, Status::Online));
        state.dispatch(&presence(2, Status::Offline));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(has_member(&state, 2));

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(!has_member(&state, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_back_online_within_grace_is_kept() {
        let state = state_with_guild(eviction_config());
        state.dispatch(&presence(2, Status::Offline));
        tokio::time::sleep(Duration::from_secs(10)).await;
        state.dispatch(&presence(2, Status::Online));

        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(has_member(&state, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_eviction_when_disabled() {
        let state = state_with_guild(StateConfig::default());
        state.dispatch(&presence(2, Status::Offline));
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(has_member(&state, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_timer_outlived_by_recreated_guild() {
        let state = state_with_guild(eviction_config());
        state.dispatch(&presence(2, Status::Offline));

        // The guild is rebuilt before the timer fires; the timer still
        // points at the old guild and must leave the new one alone.
        state.dispatch(&GatewayEvent::GuildCreate(guild_with(
            vec![text_channel(GENERAL)],
            vec![member(2, &[])],
        )));
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(has_member(&state, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_after_guild_removed_is_noop() {
        let state = state_with_guild(eviction_config());
        state.dispatch(&presence(2, Status::Offline));
        state.guild_remove(GUILD);
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;
        assert!(state.guild(GUILD).is_none());
    }

    #[test]
    fn test_eviction_disabled_without_runtime() {
        let state = state_with_guild(eviction_config());
        assert!(state.dispatch(&presence(2, Status::Offline)));
        assert!(has_member(&state, 2));
    }

    // ── Concurrency ──────────────────────────────────────────────

    #[test]
    fn test_parallel_dispatch_across_guilds() {
        let state = Arc::new(State::new(StateConfig::default()));
        std::thread::scope(|scope| {
            for g in 0..8u64 {
                let state = Arc::clone(&state);
                scope.spawn(move || {
                    let guild_id = GuildId(1000 + g);
                    let channel_id = ChannelId(2000 + g);
                    state.dispatch(&GatewayEvent::GuildCreate(Guild {
                        id: guild_id,
                        channels: Some(vec![text_channel(channel_id)]),
                        ..Default::default()
                    }));
                    for i in 0..200u64 {
                        state.dispatch(&GatewayEvent::MessageCreate(Message {
                            id: MessageId(g * 1_000 + i),
                            channel_id,
                            ..Default::default()
                        }));
                        state.dispatch(&GatewayEvent::GuildMemberAdd(Member {
                            guild_id: Some(guild_id),
                            user: user(i),
                            ..Default::default()
                        }));
                    }
                });
            }
        });

        let stats = state.stats();
        assert_eq!(stats.guilds, 8);
        assert_eq!(stats.channels, 8);
        assert_eq!(stats.members, 8 * 200);
        assert_eq!(stats.messages, 8 * 100);
    }
}
