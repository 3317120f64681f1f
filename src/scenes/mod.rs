pub mod collision_scene;
