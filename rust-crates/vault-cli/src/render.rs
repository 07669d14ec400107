use chrono::{
    DateTime,
    Utc,
};
use vault_sync::{
    StoreSnapshot,
    views::{
        Countdown,
        CountdownState,
        WinChance,
        format_amount,
        referral_link,
        unlocked_achievements,
    },
};

/// Plain-text summary of a snapshot, one fact per line.
pub fn status_lines(
    snapshot: &StoreSnapshot,
    now: DateTime<Utc>,
    app_url: Option<&str>,
) -> Vec<String> {
    let mut lines = Vec::new();

    match snapshot.account {
        Some(account) => lines.push(format!("Account: {}", account.short())),
        None => lines.push("Account: not connected".to_string()),
    }
    if let Some(balance) = snapshot.wallet_balance {
        lines.push(format!("Wallet balance: {}", format_amount(&balance)));
    }

    if let Some(stats) = &snapshot.user_stats {
        let chance = WinChance::from_snapshot(Some(stats), snapshot.current_round.as_ref());
        lines.push(format!("Deposited: {}", format_amount(&stats.deposited)));
        lines.push(format!("Tickets: {}", stats.tickets));
        lines.push(format!("Win chance: {chance}%"));
        lines.push(format!("Pending rewards: {}", format_amount(&stats.pending_rewards)));
        lines.push(format!("Total winnings: {}", format_amount(&stats.total_winnings)));
        lines.push(format!(
            "Referrals: {} (earned {})",
            stats.referral_count,
            format_amount(&stats.referral_earnings)
        ));
        let unlocked = unlocked_achievements(stats.achievement_flags);
        if unlocked.is_empty() {
            lines.push("Achievements: none yet".to_string());
        } else {
            let names: Vec<_> = unlocked.iter().map(|a| a.name).collect();
            lines.push(format!("Achievements: {}", names.join(", ")));
        }
    }

    if let Some(protocol) = &snapshot.protocol_stats {
        lines.push(format!(
            "Vault: {} deposited by {} users, prize pool {}, {} circles",
            format_amount(&protocol.total_deposits),
            protocol.total_users,
            format_amount(&protocol.current_prize_pool),
            protocol.total_circles
        ));
    }

    if let Some(round) = &snapshot.current_round {
        let mut countdown = Countdown::for_round(round);
        let view = countdown.tick(now);
        let line = match view.state {
            CountdownState::Counting => {
                let t = view.time_left;
                format!(
                    "Round #{}: {}d {}h {}m {}s left, prize {}",
                    round.id,
                    t.days,
                    t.hours,
                    t.minutes,
                    t.seconds,
                    format_amount(&round.prize_pool)
                )
            }
            CountdownState::Ended if countdown.can_finalize(round) => {
                format!("Round #{}: ended, ready to finalize", round.id)
            }
            CountdownState::Ended => format!("Round #{}: ended and finalized", round.id),
        };
        lines.push(line);
    }

    if !snapshot.leaderboard.is_empty() {
        lines.push("Leaderboard:".to_string());
        for (rank, entry) in snapshot.leaderboard.iter().enumerate() {
            lines.push(format!(
                "{:>3}. {}  {}",
                rank + 1,
                entry.address.short(),
                format_amount(&entry.deposited)
            ));
        }
    }

    if let (Some(base), Some(account)) = (app_url, snapshot.account) {
        lines.push(format!("Referral link: {}", referral_link(base, &account)));
    }
    lines
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use primitive_types::U256;
    use vault_sync::{
        Address,
        Amount,
        model::{
            Round,
            UserStats,
        },
    };

    fn round(end_time: DateTime<Utc>, finalized: bool) -> Round {
        Round {
            id: 2,
            start_time: end_time - chrono::Duration::days(7),
            end_time,
            total_tickets: U256::from(400u32),
            prize_pool: Amount::from_units(1),
            finalized,
        }
    }

    #[test]
    fn status_lines__connected_user__shows_chance_and_achievements() {
        // given
        let now = Utc::now();
        let account = Address::repeat_byte(0x12);
        let snapshot = StoreSnapshot {
            account: Some(account),
            user_stats: Some(UserStats {
                deposited: Amount::parse_decimal("1.23456").unwrap(),
                tickets: U256::from(100u32),
                total_winnings: Amount::ZERO,
                referral_earnings: Amount::ZERO,
                pending_rewards: Amount::ZERO,
                referral_count: 0,
                achievement_flags: U256::from(0b101u32),
            }),
            current_round: Some(round(now + chrono::Duration::hours(1), false)),
            ..StoreSnapshot::default()
        };

        // when
        let lines = status_lines(&snapshot, now, Some("https://vault.example/"));

        // then
        assert!(lines.contains(&"Deposited: 1.2346".to_string()));
        assert!(lines.contains(&"Win chance: 25.00%".to_string()));
        assert!(lines.contains(&"Achievements: First Deposit, Serious".to_string()));
        assert!(lines.contains(&format!(
            "Referral link: https://vault.example?ref={account}"
        )));
    }

    #[test]
    fn status_lines__ended_round__offers_finalize() {
        let now = Utc::now();
        let snapshot = StoreSnapshot {
            current_round: Some(round(now - chrono::Duration::seconds(1), false)),
            ..StoreSnapshot::default()
        };

        let lines = status_lines(&snapshot, now, None);

        assert!(lines.contains(&"Round #2: ended, ready to finalize".to_string()));
        assert_eq!(lines[0], "Account: not connected");
    }
}
