pub mod scripted_plane;
