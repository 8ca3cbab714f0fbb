//! Static registry of the star-schema DDL and transform queries.
//!
//! Pure data: one parameterized source query per target table, plus the
//! drop/create statements the pipeline runs before staging. Deduplication of
//! natural keys happens here, in the queries (one row per key, most-recent
//! by a defined tiebreak), never in the loaders.

/// Every table the pipeline owns, in drop order.
pub const ALL_TABLES: [&str; 7] = [
    "staging_events",
    "staging_songs",
    "songplays",
    "users",
    "songs",
    "artists",
    "time",
];

/// Column list pinned against [`SONGPLAY_INSERT`]'s projection.
pub const SONGPLAY_COLUMNS: [&str; 9] = [
    "songplay_id",
    "start_time",
    "userid",
    "level",
    "song_id",
    "artist_id",
    "sessionid",
    "location",
    "useragent",
];

/// Fact source query. Joins the staging tables directly; it races the
/// dimension loads by design and depends only on the two staging tasks.
pub const SONGPLAY_INSERT: &str = "\
SELECT
    md5(events.sessionid || events.start_time) AS songplay_id,
    events.start_time,
    events.userid,
    events.level,
    songs.song_id,
    songs.artist_id,
    events.sessionid,
    events.location,
    events.useragent
FROM (
    SELECT TIMESTAMP 'epoch' + ts / 1000 * INTERVAL '1 second' AS start_time, *
    FROM staging_events
    WHERE page = 'NextSong'
      AND ts IS NOT NULL
) events
LEFT JOIN staging_songs songs
    ON events.song = songs.title
   AND events.artist = songs.artist_name
   AND events.length = songs.duration";

/// User dimension source. One row per userid, most recent event wins.
pub const USER_INSERT: &str = "\
SELECT
    userid,
    firstname,
    lastname,
    gender,
    level
FROM (
    SELECT *,
        ROW_NUMBER() OVER (
            PARTITION BY userid
            ORDER BY ts DESC, sessionid DESC, iteminsession DESC
        ) AS rn
    FROM staging_events
    WHERE page = 'NextSong'
      AND userid IS NOT NULL
) t
WHERE rn = 1";

/// Song dimension source.
pub const SONG_INSERT: &str = "\
SELECT DISTINCT
    song_id,
    title,
    artist_id,
    year,
    duration
FROM staging_songs
WHERE song_id IS NOT NULL";

/// Artist dimension source. One row per artist_id.
pub const ARTIST_INSERT: &str = "\
SELECT
    artist_id,
    artist_name,
    artist_location,
    artist_latitude,
    artist_longitude
FROM (
    SELECT
        artist_id,
        artist_name,
        artist_location,
        artist_latitude,
        artist_longitude,
        ROW_NUMBER() OVER (
            PARTITION BY artist_id
            ORDER BY artist_name DESC
        ) AS rn
    FROM staging_songs
    WHERE artist_id IS NOT NULL
) t
WHERE rn = 1";

/// Time dimension source. Reads the loaded fact table, which is why the
/// time load runs after the fact load.
pub const TIME_INSERT: &str = "\
SELECT DISTINCT
    start_time,
    EXTRACT(hour FROM start_time) AS hour,
    EXTRACT(day FROM start_time) AS day,
    EXTRACT(week FROM start_time) AS week,
    EXTRACT(month FROM start_time) AS month,
    EXTRACT(year FROM start_time) AS year,
    EXTRACT(weekday FROM start_time) AS weekday
FROM songplays";

const CREATE_STAGING_EVENTS: &str = "\
CREATE TABLE IF NOT EXISTS staging_events (
    artist          VARCHAR,
    auth            VARCHAR,
    firstname       VARCHAR,
    gender          VARCHAR,
    iteminsession   INTEGER,
    lastname        VARCHAR,
    length          DOUBLE PRECISION,
    level           VARCHAR,
    location        VARCHAR,
    method          VARCHAR,
    page            VARCHAR,
    registration    BIGINT,
    sessionid       INTEGER,
    song            VARCHAR,
    status          INTEGER,
    ts              BIGINT,
    useragent       VARCHAR,
    userid          INTEGER
)";

const CREATE_STAGING_SONGS: &str = "\
CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs           INTEGER,
    artist_id           VARCHAR,
    artist_latitude     DOUBLE PRECISION,
    artist_longitude    DOUBLE PRECISION,
    artist_location     VARCHAR,
    artist_name         VARCHAR,
    song_id             VARCHAR,
    title               VARCHAR,
    duration            DOUBLE PRECISION,
    year                INTEGER
)";

const CREATE_SONGPLAYS: &str = "\
CREATE TABLE IF NOT EXISTS songplays (
    songplay_id     VARCHAR(32) NOT NULL PRIMARY KEY,
    start_time      TIMESTAMP NOT NULL,
    userid          INTEGER,
    level           VARCHAR,
    song_id         VARCHAR,
    artist_id       VARCHAR,
    sessionid       INTEGER,
    location        VARCHAR,
    useragent       VARCHAR
)";

const CREATE_USERS: &str = "\
CREATE TABLE IF NOT EXISTS users (
    userid      INTEGER NOT NULL PRIMARY KEY,
    firstname   VARCHAR,
    lastname    VARCHAR,
    gender      VARCHAR,
    level       VARCHAR
)";

const CREATE_SONGS: &str = "\
CREATE TABLE IF NOT EXISTS songs (
    song_id     VARCHAR NOT NULL PRIMARY KEY,
    title       VARCHAR,
    artist_id   VARCHAR,
    year        INTEGER,
    duration    DOUBLE PRECISION
)";

const CREATE_ARTISTS: &str = "\
CREATE TABLE IF NOT EXISTS artists (
    artist_id   VARCHAR NOT NULL PRIMARY KEY,
    name        VARCHAR,
    location    VARCHAR,
    latitude    DOUBLE PRECISION,
    longitude   DOUBLE PRECISION
)";

const CREATE_TIME: &str = "\
CREATE TABLE IF NOT EXISTS time (
    start_time  TIMESTAMP NOT NULL PRIMARY KEY,
    hour        INTEGER,
    day         INTEGER,
    week        INTEGER,
    month       INTEGER,
    year        INTEGER,
    weekday     INTEGER
)";

/// Drop statements for every pipeline table, in [`ALL_TABLES`] order.
#[must_use]
pub fn drop_statements() -> Vec<String> {
    ALL_TABLES
        .iter()
        .map(|table| format!("DROP TABLE IF EXISTS {table}"))
        .collect()
}

/// Create statements for every pipeline table.
#[must_use]
pub fn create_statements() -> Vec<String> {
    [
        CREATE_STAGING_EVENTS,
        CREATE_STAGING_SONGS,
        CREATE_SONGPLAYS,
        CREATE_USERS,
        CREATE_SONGS,
        CREATE_ARTISTS,
        CREATE_TIME,
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}
