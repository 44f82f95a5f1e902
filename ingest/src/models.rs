use diesel::prelude::*;

use transform::{MatchRecord, OpponentRecord, PlayerMatchStat};

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pathfinder_stats::match_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewMatch<'a> {
    pub match_id: i64,
    pub map_id: &'a str,
    pub map_name: &'a str,
    pub map_short_name: &'a str,
    pub game_mode: &'a str,
    pub environment: &'a str,
    pub allies_score: i32,
    pub axis_score: i32,
    pub winning_team: &'static str,
    pub start_time: chrono::NaiveDateTime,
    pub end_time: chrono::NaiveDateTime,
    pub match_duration: i64,
}

impl<'a> From<&'a MatchRecord> for NewMatch<'a> {
    fn from(record: &'a MatchRecord) -> Self {
        Self {
            match_id: record.match_id,
            map_id: &record.map_id,
            map_name: &record.map_name,
            map_short_name: &record.map_short_name,
            game_mode: &record.game_mode,
            environment: &record.environment,
            allies_score: record.allies_score,
            axis_score: record.axis_score,
            winning_team: record.winning_team.as_str(),
            start_time: record.start_time,
            end_time: record.end_time,
            match_duration: record.match_duration,
        }
    }
}

#[derive(Queryable, Selectable, Debug, PartialEq)]
#[diesel(table_name = crate::schema::pathfinder_stats::match_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoredMatch {
    pub match_id: i64,
    pub map_name: String,
    pub winning_team: String,
    pub match_duration: i64,
    pub player_count: Option<i32>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pathfinder_stats::player_match_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPlayerMatchStats<'a> {
    pub player_id: &'a str,
    pub match_id: i64,
    pub player_name: &'a str,
    pub team: Option<&'a str>,
    pub total_kills: i32,
    pub total_deaths: i32,
    pub kill_streak: i32,
    pub death_streak: i32,
    pub kills_per_minute: f64,
    pub deaths_per_minute: f64,
    pub kill_death_ratio: f64,
    pub combat_score: i32,
    pub offense_score: i32,
    pub defense_score: i32,
    pub support_score: i32,
    pub shortest_life: i32,
    pub longest_life: i32,
    pub time_played: i32,
    pub teamkills: i32,
    pub infantry_kills: i32,
    pub grenade_kills: i32,
    pub machine_gun_kills: i32,
    pub sniper_kills: i32,
    pub artillery_kills: i32,
    pub bazooka_kills: i32,
    pub mine_kills: i32,
    pub satchel_kills: i32,
    pub commander_kills: i32,
    pub armor_kills: i32,
    pub pak_kills: i32,
    pub spa_kills: i32,
    pub infantry_deaths: i32,
    pub grenade_deaths: i32,
    pub machine_gun_deaths: i32,
    pub sniper_deaths: i32,
    pub artillery_deaths: i32,
    pub bazooka_deaths: i32,
    pub mine_deaths: i32,
    pub satchel_deaths: i32,
    pub commander_deaths: i32,
    pub armor_deaths: i32,
    pub pak_deaths: i32,
    pub spa_deaths: i32,
    pub raw_info: Option<&'a serde_json::Value>,
}

impl<'a> From<&'a PlayerMatchStat> for NewPlayerMatchStats<'a> {
    fn from(stat: &'a PlayerMatchStat) -> Self {
        Self {
            player_id: &stat.player_id,
            match_id: stat.match_id,
            player_name: &stat.player_name,
            team: stat.team.as_deref(),
            total_kills: stat.total_kills,
            total_deaths: stat.total_deaths,
            kill_streak: stat.kill_streak,
            death_streak: stat.death_streak,
            kills_per_minute: stat.kills_per_minute,
            deaths_per_minute: stat.deaths_per_minute,
            kill_death_ratio: stat.kill_death_ratio,
            combat_score: stat.combat_score,
            offense_score: stat.offense_score,
            defense_score: stat.defense_score,
            support_score: stat.support_score,
            shortest_life: stat.shortest_life,
            longest_life: stat.longest_life,
            time_played: stat.time_played,
            teamkills: stat.teamkills,
            infantry_kills: stat.kills_by_type.infantry,
            grenade_kills: stat.kills_by_type.grenade,
            machine_gun_kills: stat.kills_by_type.machine_gun,
            sniper_kills: stat.kills_by_type.sniper,
            artillery_kills: stat.kills_by_type.artillery,
            bazooka_kills: stat.kills_by_type.bazooka,
            mine_kills: stat.kills_by_type.mine,
            satchel_kills: stat.kills_by_type.satchel,
            commander_kills: stat.kills_by_type.commander,
            armor_kills: stat.kills_by_type.armor,
            pak_kills: stat.kills_by_type.pak,
            spa_kills: stat.kills_by_type.spa,
            infantry_deaths: stat.deaths_by_type.infantry,
            grenade_deaths: stat.deaths_by_type.grenade,
            machine_gun_deaths: stat.deaths_by_type.machine_gun,
            sniper_deaths: stat.deaths_by_type.sniper,
            artillery_deaths: stat.deaths_by_type.artillery,
            bazooka_deaths: stat.deaths_by_type.bazooka,
            mine_deaths: stat.deaths_by_type.mine,
            satchel_deaths: stat.deaths_by_type.satchel,
            commander_deaths: stat.deaths_by_type.commander,
            armor_deaths: stat.deaths_by_type.armor,
            pak_deaths: stat.deaths_by_type.pak,
            spa_deaths: stat.deaths_by_type.spa,
            raw_info: Some(&stat.raw_info).filter(|raw| !raw.is_null()),
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pathfinder_stats::player_victim)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPlayerVictim<'a> {
    pub player_id: &'a str,
    pub match_id: i64,
    pub player_name: &'a str,
    pub team: Option<&'a str>,
    pub victim_name: &'a str,
    pub kill_count: i32,
}

impl<'a> From<&OpponentRecord<'a>> for NewPlayerVictim<'a> {
    fn from(record: &OpponentRecord<'a>) -> Self {
        Self {
            player_id: record.player_id,
            match_id: record.match_id,
            player_name: record.player_name,
            team: record.team,
            victim_name: record.opponent_name,
            kill_count: record.count,
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::pathfinder_stats::player_nemesis)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPlayerNemesis<'a> {
    pub player_id: &'a str,
    pub match_id: i64,
    pub player_name: &'a str,
    pub team: Option<&'a str>,
    pub nemesis_name: &'a str,
    pub death_count: i32,
}

impl<'a> From<&OpponentRecord<'a>> for NewPlayerNemesis<'a> {
    fn from(record: &OpponentRecord<'a>) -> Self {
        Self {
            player_id: record.player_id,
            match_id: record.match_id,
            player_name: record.player_name,
            team: record.team,
            nemesis_name: record.opponent_name,
            death_count: record.count,
        }
    }
}
