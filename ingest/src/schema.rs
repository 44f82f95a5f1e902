// Weapon category columns of the kill and death tables come from the weapon
// registry at run time, so only their key columns are declared here.

pub mod pathfinder_stats {
    diesel::table! {
        pathfinder_stats.match_history (match_id) {
            match_id -> Int8,
            map_id -> Text,
            map_name -> Text,
            map_short_name -> Text,
            game_mode -> Text,
            environment -> Text,
            allies_score -> Int4,
            axis_score -> Int4,
            winning_team -> Text,
            start_time -> Timestamp,
            end_time -> Timestamp,
            match_duration -> Int8,
            player_count -> Nullable<Int4>,
        }
    }

    diesel::table! {
        pathfinder_stats.player_match_stats (player_id, match_id) {
            player_id -> Text,
            match_id -> Int8,
            player_name -> Text,
            team -> Nullable<Text>,
            total_kills -> Int4,
            total_deaths -> Int4,
            kill_streak -> Int4,
            death_streak -> Int4,
            kills_per_minute -> Float8,
            deaths_per_minute -> Float8,
            kill_death_ratio -> Float8,
            combat_score -> Int4,
            offense_score -> Int4,
            defense_score -> Int4,
            support_score -> Int4,
            shortest_life -> Int4,
            longest_life -> Int4,
            time_played -> Int4,
            teamkills -> Int4,
            infantry_kills -> Int4,
            grenade_kills -> Int4,
            machine_gun_kills -> Int4,
            sniper_kills -> Int4,
            artillery_kills -> Int4,
            bazooka_kills -> Int4,
            mine_kills -> Int4,
            satchel_kills -> Int4,
            commander_kills -> Int4,
            armor_kills -> Int4,
            pak_kills -> Int4,
            spa_kills -> Int4,
            infantry_deaths -> Int4,
            grenade_deaths -> Int4,
            machine_gun_deaths -> Int4,
            sniper_deaths -> Int4,
            artillery_deaths -> Int4,
            bazooka_deaths -> Int4,
            mine_deaths -> Int4,
            satchel_deaths -> Int4,
            commander_deaths -> Int4,
            armor_deaths -> Int4,
            pak_deaths -> Int4,
            spa_deaths -> Int4,
            raw_info -> Nullable<Jsonb>,
        }
    }

    diesel::table! {
        pathfinder_stats.player_kill_stats (player_id, match_id) {
            player_id -> Text,
            match_id -> Int8,
            player_name -> Text,
            team -> Nullable<Text>,
        }
    }

    diesel::table! {
        pathfinder_stats.player_death_stats (player_id, match_id) {
            player_id -> Text,
            match_id -> Int8,
            player_name -> Text,
            team -> Nullable<Text>,
        }
    }

    diesel::table! {
        pathfinder_stats.player_victim (player_id, match_id, victim_name) {
            player_id -> Text,
            match_id -> Int8,
            player_name -> Text,
            team -> Nullable<Text>,
            victim_name -> Text,
            kill_count -> Int4,
        }
    }

    diesel::table! {
        pathfinder_stats.player_nemesis (player_id, match_id, nemesis_name) {
            player_id -> Text,
            match_id -> Int8,
            player_name -> Text,
            team -> Nullable<Text>,
            nemesis_name -> Text,
            death_count -> Int4,
        }
    }

    diesel::allow_tables_to_appear_in_same_query!(
        match_history,
        player_match_stats,
        player_kill_stats,
        player_death_stats,
        player_victim,
        player_nemesis,
    );
}
